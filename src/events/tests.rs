use super::{EventNotifier, NoopObserver, SessionEvent, SessionState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn test_notifier_delivers_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut notifier = EventNotifier::new(Box::new(move |event: &SessionEvent| {
        sink.lock().unwrap().push(event.clone());
    }));

    notifier.notify(SessionEvent::Connected);
    notifier.notify(SessionEvent::ReconnectAttempt {
        attempt: 1,
        delay: Duration::from_millis(10),
    });
    notifier.notify(SessionEvent::Disconnected);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], SessionEvent::Connected);
    assert_eq!(seen[2], SessionEvent::Disconnected);
}

#[test]
fn test_notifier_survives_panicking_observer() {
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let mut notifier = EventNotifier::new(Box::new(move |_: &SessionEvent| {
        *counter.lock().unwrap() += 1;
        panic!("observer blew up");
    }));

    notifier.notify(SessionEvent::Connected);
    notifier.notify(SessionEvent::Disconnected);
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[test]
fn test_noop_observer() {
    let mut notifier = EventNotifier::new(Box::new(NoopObserver));
    notifier.notify(SessionEvent::ReconnectFailed { attempts: 3 });
}

#[test]
fn test_display() {
    assert_eq!(SessionState::Reconnecting.to_string(), "reconnecting");
    assert_eq!(
        SessionEvent::ReconnectFailed { attempts: 3 }.to_string(),
        "reconnect failed after 3 attempts"
    );
}
