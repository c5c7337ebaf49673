//! In-memory backend reporting its lifecycle to a shared probe.

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use testbed::{
    BoxError,
    Configuration,
    ServerFactory,
    ServerSettings,
    server::Backend,
};

/// Counters shared between a test and the backends it causes to be built.
#[derive(Debug, Default)]
pub struct BackendProbe {
    builds: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    configurations: Mutex<Vec<Arc<ProbeConfiguration>>>,
}

impl BackendProbe {
    /// Number of backends built.
    #[must_use]
    pub fn builds(&self) -> usize { self.builds.load(Ordering::SeqCst) }

    /// Number of start attempts.
    #[must_use]
    pub fn starts(&self) -> usize { self.starts.load(Ordering::SeqCst) }

    /// Number of stop attempts.
    #[must_use]
    pub fn stops(&self) -> usize { self.stops.load(Ordering::SeqCst) }

    /// Configurations the backends were built from, in build order.
    #[must_use]
    pub fn configurations(&self) -> Vec<Arc<ProbeConfiguration>> {
        self.configurations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_build(&self, config: &Arc<ProbeConfiguration>) {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.configurations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(config));
    }
}

/// Configuration selecting [`RecordingBackend`].
pub struct ProbeConfiguration {
    settings: ServerSettings,
    probe: Arc<BackendProbe>,
    fail_start: bool,
    fail_stop: bool,
}

impl fmt::Debug for ProbeConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeConfiguration")
            .field("settings", &self.settings)
            .field("fail_start", &self.fail_start)
            .field("fail_stop", &self.fail_stop)
            .finish_non_exhaustive()
    }
}

impl ProbeConfiguration {
    /// Create a configuration reporting to `probe`.
    #[must_use]
    pub fn new(probe: Arc<BackendProbe>) -> Self {
        Self {
            settings: ServerSettings::default(),
            probe,
            fail_start: false,
            fail_stop: false,
        }
    }

    /// Replace the backend-independent settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ServerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Make every start attempt fail.
    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Make every stop attempt fail.
    #[must_use]
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// The probe this configuration reports to.
    #[must_use]
    pub fn probe(&self) -> &Arc<BackendProbe> { &self.probe }
}

impl Configuration for ProbeConfiguration {
    fn settings(&self) -> &ServerSettings { &self.settings }
}

/// Backend that only counts calls.
#[derive(Debug)]
pub struct RecordingBackend {
    config: Arc<ProbeConfiguration>,
    listening: bool,
}

impl RecordingBackend {
    /// Build a backend for `config`, recording the build on its probe.
    #[must_use]
    pub fn new(config: Arc<ProbeConfiguration>) -> Self {
        config.probe.record_build(&config);
        Self {
            config,
            listening: false,
        }
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &'static str { "recording" }

    fn start(&mut self) -> Result<(), BoxError> {
        self.config.probe.starts.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_start {
            return Err("recording backend refused to start".into());
        }
        self.listening = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.config.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.listening = false;
        if self.config.fail_stop {
            return Err("recording backend refused to stop".into());
        }
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        let port = match self.config.settings.port_number() {
            0 => 8080,
            port => port,
        };
        self.listening
            .then(|| SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port))
    }
}

/// Factory serving [`ProbeConfiguration`] with [`RecordingBackend`].
#[must_use]
pub fn probe_factory() -> Arc<ServerFactory> {
    Arc::new(ServerFactory::new().register(RecordingBackend::new))
}

/// Like [`probe_factory`], with a default configuration reporting to
/// `probe` for groups declaring none.
#[must_use]
pub fn probe_factory_with_default(probe: &Arc<BackendProbe>) -> Arc<ServerFactory> {
    let probe = Arc::clone(probe);
    Arc::new(
        ServerFactory::new()
            .register(RecordingBackend::new)
            .with_default_from(move || Arc::new(ProbeConfiguration::new(Arc::clone(&probe)))),
    )
}
