use parking_lot::Mutex;
use rxnet::{
    BehaviorSubject, Disposable, DisposeBag, Error, Event, Observable, PublishSubject,
    ReplaySubject,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("anError")]
struct AnError;

fn print(
    label: &'static str,
    log: &Arc<Mutex<Vec<String>>>,
) -> impl Fn(Event<String>) + Send + Sync + 'static {
    let log = log.clone();
    move |event: Event<String>| log.lock().push(format!("{}) {}", label, event))
}

fn subscribe(
    observable: &Observable<String>,
    label: &'static str,
    log: &Arc<Mutex<Vec<String>>>,
) -> Disposable {
    observable.subscribe(print(label, log))
}

#[test]
fn publish_subject_only_reaches_current_observers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let subject = PublishSubject::new();
    subject.on_next("Is anyone listening?".to_string());

    let one = subscribe(&subject.as_observable(), "1", &log);
    subject.on_next("1".to_string());
    let two = subscribe(&subject.as_observable(), "2", &log);
    subject.on_next("2".to_string());
    one.dispose();
    subject.on_next("3".to_string());
    subject.on_completed();
    subject.on_next("5".to_string());
    two.dispose();

    let bag = DisposeBag::new();
    subscribe(&subject.as_observable(), "3", &log).disposed_by(&bag);
    subject.on_next("?".to_string());

    assert_eq!(
        *log.lock(),
        vec![
            "1) next(1)",
            "1) next(2)",
            "2) next(2)",
            "2) next(3)",
            "2) completed",
            "3) completed",
        ]
    );
}

#[test]
fn behavior_subject_replays_its_latest_value() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let subject = BehaviorSubject::new("Initial value".to_string());
    let bag = DisposeBag::new();

    subject.on_next("X".to_string());
    subscribe(&subject.as_observable(), "1", &log).disposed_by(&bag);
    subject.on_error(Error::custom(AnError));
    subscribe(&subject.as_observable(), "2", &log).disposed_by(&bag);

    assert_eq!(
        *log.lock(),
        vec![
            "1) next(X)",
            "1) error(anError)",
            "2) next(X)",
            "2) error(anError)",
        ]
    );
}

#[test]
fn replay_subject_after_error_and_dispose() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let subject = ReplaySubject::new(2);
    let bag = DisposeBag::new();

    subject.on_next("1".to_string());
    subject.on_next("2".to_string());
    subject.on_next("3".to_string());

    subscribe(&subject.as_observable(), "1", &log).disposed_by(&bag);
    subscribe(&subject.as_observable(), "2", &log).disposed_by(&bag);

    subject.on_next("4".to_string());
    subject.on_error(Error::custom(AnError));
    subject.dispose();

    subscribe(&subject.as_observable(), "3", &log).disposed_by(&bag);

    assert_eq!(
        *log.lock(),
        vec![
            "1) next(2)",
            "1) next(3)",
            "2) next(2)",
            "2) next(3)",
            "1) next(4)",
            "2) next(4)",
            "1) error(anError)",
            "2) error(anError)",
            "3) error(anError)",
        ]
    );
}

#[test]
fn replay_subject_without_dispose_replays_window_then_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let subject = ReplaySubject::new(2);

    for value in ["1", "2", "3", "4"] {
        subject.on_next(value.to_string());
    }
    subject.on_error(Error::custom(AnError));

    let _subscription = subscribe(&subject.as_observable(), "B", &log);

    assert_eq!(
        *log.lock(),
        vec!["B) next(3)", "B) next(4)", "B) error(anError)"]
    );
}

#[test]
fn bags_dispose_their_subscriptions_when_dropped() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let subject = PublishSubject::new();

    {
        let bag = DisposeBag::new();
        subscribe(&subject.as_observable(), "1", &log).disposed_by(&bag);
        subject.on_next("a".to_string());
        assert_eq!(subject.observer_count(), 1);
    }
    subject.on_next("b".to_string());

    assert_eq!(*log.lock(), vec!["1) next(a)"]);
    assert_eq!(subject.observer_count(), 0);
}

#[test]
fn subjects_can_feed_other_subjects() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let source = PublishSubject::new();
    let target = ReplaySubject::new(1);
    let bag = DisposeBag::new();

    source
        .as_observable()
        .map(|value: String| value.to_uppercase())
        .subscribe(target.clone())
        .disposed_by(&bag);
    source.on_next("a".to_string());
    source.on_next("b".to_string());
    source.on_completed();

    subscribe(&target.as_observable(), "1", &log).disposed_by(&bag);

    assert!(target.is_terminated());
    assert_eq!(*log.lock(), vec!["1) next(B)", "1) completed"]);
}
