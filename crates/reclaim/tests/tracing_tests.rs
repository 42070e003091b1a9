//! Tracing output of scenario runs.
#![cfg(feature = "tracing")]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reclaim::{HarnessConfig, Scenario};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn config() -> HarnessConfig {
    HarnessConfig::default()
        .with_tick(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(1))
}

#[test]
fn test_scenario_logs_transitions_and_result() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(captured.clone())
        .with_ansi(false)
        .finish();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    tracing::subscriber::with_default(subscriber, || {
        rt.block_on(
            Scenario::new("traced").with_config(config()).run(|settle| async move {
                let expected = settle.expect(["traced.value"])?;
                let registry = settle.registry(expected, |_key| Ok(()));
                registry.register(&Arc::new(()), "traced.value");
                Ok(())
            }),
        )
        .unwrap();
    });

    let output = captured.contents();
    assert!(output.contains("reclaim_scenario"), "{output}");
    assert!(output.contains("scenario=\"traced\""), "{output}");
    assert!(output.contains("scenario state"), "{output}");
    assert!(output.contains("scenario passed"), "{output}");
}

#[test]
fn test_timeout_is_logged_as_error() {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(captured.clone())
        .with_ansi(false)
        .finish();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let kept = Arc::new(());
    let watched = Arc::clone(&kept);
    tracing::subscriber::with_default(subscriber, || {
        let config = config().with_timeout(Duration::from_millis(100));
        let error = rt
            .block_on(Scenario::new("stuck").with_config(config).run(move |settle| async move {
                let expected = settle.expect(["stuck.value"])?;
                let registry = settle.registry(expected, |_key| Ok(()));
                registry.register(&watched, "stuck.value");
                Ok(())
            }))
            .unwrap_err();
        assert!(error.is_timeout());
    });

    let output = captured.contents();
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("scenario timed out"), "{output}");
    drop(kept);
}
