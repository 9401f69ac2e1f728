//! Connection lifecycle behaviour: registration, application callbacks and
//! escalation of invariant violations.

use block_server::{
    Client, ClientRegistry, Connection, ConnectionId, ConnectionLifecycle, EventError, LifecycleError, LogError,
    LogSink, PanicSignal, RegistryError, ServerError, ServerEvents, Severity,
};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct StubConnection {
    id: ConnectionId,
    addr: SocketAddr,
}

impl Connection for StubConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    fn send(&self, _data: Vec<u8>) -> Result<(), ServerError> {
        Ok(())
    }

    fn disconnect(&self, _reason: &str) {}
}

fn connection(id: ConnectionId) -> Arc<dyn Connection> {
    Arc::new(StubConnection {
        id,
        addr: SocketAddr::from(([192, 168, 0, 10], 40000 + id as u16)),
    })
}

struct QuietSink;

impl LogSink for QuietSink {
    fn write(&self, _message: &str, _severity: Severity) -> Result<(), LogError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Default)]
enum Failure {
    #[default]
    None,
    Error,
    Panic,
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    connect_failure: Failure,
    disconnect_failure: Failure,
}

impl Recorder {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ServerEvents for Recorder {
    fn on_connect(&self, client: &Arc<Client>) -> Result<(), EventError> {
        self.calls.lock().unwrap().push(format!("connect {}", client.id()));
        match self.connect_failure {
            Failure::None => Ok(()),
            Failure::Error => Err(EventError::HandlerExecution("connect refused".to_string())),
            Failure::Panic => panic!("connect handler exploded"),
        }
    }

    fn on_disconnect(&self, client: &Arc<Client>, reason: &str) -> Result<(), EventError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("disconnect {} ({})", client.id(), reason));
        match self.disconnect_failure {
            Failure::None => Ok(()),
            Failure::Error => Err(EventError::HandlerExecution("disconnect refused".to_string())),
            Failure::Panic => panic!("disconnect handler exploded"),
        }
    }
}

struct Harness {
    lifecycle: ConnectionLifecycle,
    events: Arc<Recorder>,
    escalations: Arc<AtomicUsize>,
}

fn harness(events: Recorder) -> Harness {
    let escalations = Arc::new(AtomicUsize::new(0));
    let counter = escalations.clone();
    let panic = Arc::new(PanicSignal::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let events = Arc::new(events);
    let lifecycle = ConnectionLifecycle::new(
        Arc::new(ClientRegistry::new()),
        panic,
        Arc::new(QuietSink),
        events.clone(),
    );
    Harness {
        lifecycle,
        events,
        escalations,
    }
}

#[test]
fn test_accept_then_disconnect() {
    let h = harness(Recorder::default());
    let conn = connection(1);

    let client = h.lifecycle.on_accept(conn.clone()).unwrap();
    assert_eq!(client.id(), 1);
    assert_eq!(client.remote_addr(), conn.remote_addr());
    assert_eq!(h.lifecycle.registry().count(), 1);

    let removed = h.lifecycle.on_disconnect(&conn, None).unwrap();
    assert!(Arc::ptr_eq(&client, &removed));
    assert!(h.lifecycle.registry().is_empty());

    assert_eq!(h.events.calls(), vec!["connect 1", "disconnect 1 ()"]);
    assert_eq!(h.escalations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_disconnect_reason_is_passed_through() {
    let h = harness(Recorder::default());
    let conn = connection(2);

    h.lifecycle.on_accept(conn.clone()).unwrap();
    h.lifecycle.on_disconnect(&conn, Some("Timed out")).unwrap();

    assert_eq!(h.events.calls(), vec!["connect 2", "disconnect 2 (Timed out)"]);
}

#[test]
fn test_duplicate_accept_escalates() {
    let h = harness(Recorder::default());
    let conn = connection(3);

    h.lifecycle.on_accept(conn.clone()).unwrap();
    let result = h.lifecycle.on_accept(conn.clone());

    assert!(matches!(
        result,
        Err(LifecycleError::Registry(RegistryError::Duplicate(3)))
    ));
    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
    // The first registration is untouched and on_connect fired once.
    assert_eq!(h.lifecycle.registry().count(), 1);
    assert_eq!(h.events.calls(), vec!["connect 3"]);
}

#[test]
fn test_disconnect_of_unknown_connection_escalates() {
    let h = harness(Recorder::default());

    let result = h.lifecycle.on_disconnect(&connection(77), Some("gone"));

    assert!(matches!(
        result,
        Err(LifecycleError::Registry(RegistryError::Missing(77)))
    ));
    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
    assert!(h.events.calls().is_empty());
}

#[test]
fn test_second_disconnect_escalates() {
    let h = harness(Recorder::default());
    let conn = connection(4);

    h.lifecycle.on_accept(conn.clone()).unwrap();
    h.lifecycle.on_disconnect(&conn, None).unwrap();
    assert!(h.lifecycle.on_disconnect(&conn, None).is_err());

    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
    assert_eq!(h.events.calls(), vec!["connect 4", "disconnect 4 ()"]);
}

#[test]
fn test_connect_handler_error_escalates() {
    let h = harness(Recorder {
        connect_failure: Failure::Error,
        ..Recorder::default()
    });

    let result = h.lifecycle.on_accept(connection(5));

    match result {
        Err(LifecycleError::Connect { addr, source }) => {
            assert_eq!(addr, connection(5).remote_addr());
            assert!(matches!(source, EventError::HandlerExecution(_)));
        }
        other => panic!("unexpected result: {:?}", other.map(|client| client.id())),
    }
    assert!(h.lifecycle.panic_signal().is_panicked());
    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_connect_handler_panic_escalates_then_propagates() {
    let h = harness(Recorder {
        connect_failure: Failure::Panic,
        ..Recorder::default()
    });

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| h.lifecycle.on_accept(connection(6))));

    let payload = outcome.err().expect("the handler's panic should keep unwinding");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"connect handler exploded"));
    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disconnect_handler_error_escalates() {
    let h = harness(Recorder {
        disconnect_failure: Failure::Error,
        ..Recorder::default()
    });
    let conn = connection(7);

    h.lifecycle.on_accept(conn.clone()).unwrap();
    let result = h.lifecycle.on_disconnect(&conn, Some("bye"));

    assert!(matches!(result, Err(LifecycleError::Disconnect { .. })));
    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
    // Deregistration happened before the handler ran.
    assert!(h.lifecycle.registry().is_empty());
}

#[test]
fn test_disconnect_handler_panic_escalates_then_propagates() {
    let h = harness(Recorder {
        disconnect_failure: Failure::Panic,
        ..Recorder::default()
    });
    let conn = connection(8);
    h.lifecycle.on_accept(conn.clone()).unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| h.lifecycle.on_disconnect(&conn, None)));

    assert!(outcome.is_err());
    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_escalation_is_recorded_before_the_panic_reaches_the_caller() {
    let fired = Arc::new(AtomicBool::new(false));
    let observed_before_unwind = Arc::new(AtomicBool::new(false));

    let panic_signal = {
        let fired = fired.clone();
        Arc::new(PanicSignal::new(move || fired.store(true, Ordering::SeqCst)))
    };
    let lifecycle = ConnectionLifecycle::new(
        Arc::new(ClientRegistry::new()),
        panic_signal,
        Arc::new(QuietSink),
        Arc::new(Recorder {
            connect_failure: Failure::Panic,
            ..Recorder::default()
        }),
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        struct Witness {
            fired: Arc<AtomicBool>,
            observed: Arc<AtomicBool>,
        }

        impl Drop for Witness {
            fn drop(&mut self) {
                // Runs while the panic unwinds out of on_accept.
                self.observed.store(self.fired.load(Ordering::SeqCst), Ordering::SeqCst);
            }
        }

        let _witness = Witness {
            fired: fired.clone(),
            observed: observed_before_unwind.clone(),
        };
        lifecycle.on_accept(connection(9))
    }));

    assert!(outcome.is_err());
    assert!(observed_before_unwind.load(Ordering::SeqCst));
}

#[test]
fn test_repeated_violations_escalate_once() {
    let h = harness(Recorder::default());

    for id in 100..110 {
        assert!(h.lifecycle.on_disconnect(&connection(id), None).is_err());
    }

    assert_eq!(h.escalations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_connections() {
    const WORKERS: usize = 8;
    const PER_WORKER: usize = 50;

    let h = Arc::new(harness(Recorder::default()));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let h = h.clone();
            std::thread::spawn(move || {
                for i in 0..PER_WORKER {
                    let conn = connection(worker * PER_WORKER + i);
                    h.lifecycle.on_accept(conn.clone()).unwrap();
                    h.lifecycle.on_disconnect(&conn, None).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let calls = h.events.calls();
    assert_eq!(calls.len(), WORKERS * PER_WORKER * 2);
    assert!(h.lifecycle.registry().is_empty());
    assert_eq!(h.escalations.load(Ordering::SeqCst), 0);
}
