//! Demo binary running echo cases against the embedded TCP backend.

mod cli;

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use testbed::{
    GroupDescriptor,
    GroupRunner,
    ServerFactory,
    ServerSettings,
    TestCase,
    tcp::{TcpClient, TcpClientFactory, TcpConfiguration},
};

const CLIENT: &str = "client";

fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let config = TcpConfiguration::default()
        .with_settings(ServerSettings::default().port(cli.port))
        .workers(cli.workers);
    let descriptor = GroupDescriptor::new("echo")
        .configuration(Arc::new(config))
        .inject_client(CLIENT, Arc::new(TcpClientFactory::new()));

    let payload = Arc::new(cli.payload.into_bytes());
    let cases = (1..=cli.cases).map(|n| {
        let payload = Arc::clone(&payload);
        TestCase::new(format!("echo-{n}"), move |ctx| {
            let client = ctx
                .client::<TcpClient>(CLIENT)
                .ok_or("client not injected")?;
            let response = client.request(&payload)?;
            if response == *payload {
                Ok(())
            } else {
                Err(format!("unexpected response: {response:?}").into())
            }
        })
    });

    let report = GroupRunner::new(descriptor, Arc::new(ServerFactory::tcp())).run(cases);
    println!("{report}");
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
