//! Integration tests for the activity recognition session

use activity_fusion_agent::classifier::{
    Classifier, InferenceError, LinearLoader, LoadError, BUNDLED_ACCELEROMETER_MODEL,
};
use activity_fusion_agent::config::Config;
use activity_fusion_agent::core::{
    ActivityLabel, ActivityObserver, FeedError, SensorSet, Session, SessionConfig, SessionError,
    SessionState, Window,
};
use activity_fusion_agent::source::{ManualSource, SampleInjector, SensorId, NUM_AXES};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Progress(usize, usize, Option<[f32; NUM_AXES]>),
    Activity(ActivityLabel),
}

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<Event>>>);

impl Events {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl ActivityObserver for Events {
    fn on_progress(&mut self, filled: usize, total: usize, last: Option<[f32; NUM_AXES]>) {
        self.0.lock().unwrap().push(Event::Progress(filled, total, last));
    }

    fn on_activity(&mut self, label: ActivityLabel) {
        self.0.lock().unwrap().push(Event::Activity(label));
    }
}

/// Classifier that records every window and returns fixed scores.
struct Recording {
    scores: Vec<f32>,
    windows: Arc<Mutex<Vec<Window>>>,
}

impl Classifier for Recording {
    fn infer(&mut self, window: &Window) -> Result<Vec<f32>, InferenceError> {
        self.windows.lock().unwrap().push(window.clone());
        Ok(self.scores.clone())
    }
}

fn recording_loader(
    scores: Vec<f32>,
    windows: Arc<Mutex<Vec<Window>>>,
) -> impl Fn(&[u8]) -> Result<Box<dyn Classifier>, LoadError> {
    move |_model: &[u8]| {
        Ok(Box::new(Recording {
            scores: scores.clone(),
            windows: Arc::clone(&windows),
        }) as Box<dyn Classifier>)
    }
}

fn started_session(
    sensors: SensorSet,
    timesteps: usize,
    loader: &dyn activity_fusion_agent::ClassifierLoader,
) -> (Session<ManualSource>, SampleInjector, Events) {
    let source = ManualSource::new(1024);
    let injector = source.injector();
    let events = Events::default();
    let mut session = Session::new(SessionConfig::new(sensors, timesteps), source)
        .unwrap()
        .with_observer(Box::new(events.clone()));
    session.init(loader, b"model").unwrap();
    session.start().unwrap();
    events.take();
    (session, injector, events)
}

#[test]
fn test_two_timestep_window_end_to_end() {
    let windows = Arc::new(Mutex::new(Vec::new()));
    let loader = recording_loader(vec![0.1, 0.1, 0.6, 0.1, 0.05, 0.05], Arc::clone(&windows));
    let (mut session, injector, events) = started_session(SensorSet::full(), 2, &loader);

    injector.push(SensorId::Accelerometer, &[1.0, 2.0, 3.0]);
    injector.push(SensorId::LinearAcceleration, &[4.0, 5.0, 6.0]);
    injector.push(SensorId::RotationVector, &[7.0, 8.0, 9.0]);
    session.poll(Duration::from_millis(100)).unwrap();

    assert_eq!(
        events.take(),
        vec![Event::Progress(1, 2, Some([7.0, 8.0, 9.0]))]
    );

    // Second timestep arrives in a different order
    injector.push(SensorId::RotationVector, &[17.0, 18.0, 19.0]);
    injector.push(SensorId::Accelerometer, &[11.0, 12.0, 13.0]);
    injector.push(SensorId::LinearAcceleration, &[14.0, 15.0, 16.0]);
    session.poll(Duration::from_millis(100)).unwrap();

    assert_eq!(
        events.take(),
        vec![
            Event::Activity(ActivityLabel::Activity(2)),
            Event::Progress(0, 2, None),
        ]
    );

    let windows = windows.lock().unwrap();
    assert_eq!(windows.len(), 1);
    let window = &windows[0];
    assert_eq!(window.num_timesteps(), 2);
    assert_eq!(window.row_width(), 9);
    assert_eq!(
        window.timestep(0),
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
    );
    assert_eq!(
        window.timestep(1),
        &[11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0]
    );
}

#[test]
fn test_unavailable_classifier_reports_sentinel() {
    let failing = |_model: &[u8]| -> Result<Box<dyn Classifier>, LoadError> {
        Err(LoadError::Shape("corrupt model".to_string()))
    };

    let source = ManualSource::new(64);
    let injector = source.injector();
    let events = Events::default();
    let mut session = Session::new(SessionConfig::new(SensorSet::accelerometer_only(), 2), source)
        .unwrap()
        .with_observer(Box::new(events.clone()));

    session.init(&failing, b"").unwrap();
    assert_eq!(events.take(), vec![Event::Activity(ActivityLabel::Unavailable)]);
    assert_eq!(session.state(), SessionState::Ready);

    session.start().unwrap();
    events.take();
    for value in [0.1, 0.2, 0.3, 0.4] {
        injector.push(SensorId::Accelerometer, &[value, value, value]);
    }
    assert_eq!(session.poll(Duration::from_millis(100)).unwrap(), 4);

    let activities: Vec<_> = events
        .take()
        .into_iter()
        .filter(|e| matches!(e, Event::Activity(_)))
        .collect();
    assert_eq!(
        activities,
        vec![
            Event::Activity(ActivityLabel::Unavailable),
            Event::Activity(ActivityLabel::Unavailable),
        ]
    );
    assert_eq!(ActivityLabel::Unavailable.code(), -1);
    assert_eq!(session.telemetry().stats().unavailable_windows, 2);
}

#[test]
fn test_every_window_is_classified_exactly_once() {
    let windows = Arc::new(Mutex::new(Vec::new()));
    let loader = recording_loader(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0], Arc::clone(&windows));
    let (mut session, _injector, events) = started_session(SensorSet::full(), 128, &loader);

    for window in 0..3 {
        for t in 0..128 {
            let v = (window * 128 + t) as f32;
            session.feed(SensorId::LinearAcceleration, &[v, 0.0, 0.0]).unwrap();
            session.feed(SensorId::Accelerometer, &[v, 1.0, 0.0]).unwrap();
            // Extra reading in the same timestep is dropped
            session.feed(SensorId::Accelerometer, &[-1.0, -1.0, -1.0]).unwrap();
            session.feed(SensorId::RotationVector, &[v, 2.0, 0.0]).unwrap();
        }
    }

    let windows = windows.lock().unwrap();
    assert_eq!(windows.len(), 3);
    for (i, window) in windows.iter().enumerate() {
        let first = (i * 128) as f32;
        assert_eq!(window.timestep(0)[0], first);
        assert!(window.as_flat().iter().all(|v| *v >= 0.0));
    }

    let activities = events
        .take()
        .into_iter()
        .filter(|e| *e == Event::Activity(ActivityLabel::Activity(5)))
        .count();
    assert_eq!(activities, 3);

    let stats = session.telemetry().stats();
    assert_eq!(stats.windows_completed, 3);
    assert_eq!(stats.samples_dropped, 3 * 128);
    assert_eq!(stats.timesteps_completed, 3 * 128);
}

#[test]
fn test_restart_discards_partial_window() {
    let windows = Arc::new(Mutex::new(Vec::new()));
    let loader = recording_loader(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0], Arc::clone(&windows));
    let (mut session, injector, events) = started_session(SensorSet::full(), 2, &loader);

    for sensor in SensorId::ALL {
        session.feed(sensor, &[5.0, 5.0, 5.0]).unwrap();
    }
    session.feed(SensorId::Accelerometer, &[6.0, 6.0, 6.0]).unwrap();
    session.stop().unwrap();

    // Readings pushed while paused never reach the buffer
    assert!(!injector.push(SensorId::LinearAcceleration, &[6.0, 6.0, 6.0]));

    session.start().unwrap();
    events.take();
    for sensor in SensorId::ALL {
        session.feed(sensor, &[7.0, 7.0, 7.0]).unwrap();
    }
    assert!(windows.lock().unwrap().is_empty());

    for sensor in SensorId::ALL {
        session.feed(sensor, &[8.0, 8.0, 8.0]).unwrap();
    }
    let windows = windows.lock().unwrap();
    assert_eq!(windows.len(), 1);
    assert!(windows[0].timestep(0).iter().all(|v| *v == 7.0));
    assert!(windows[0].timestep(1).iter().all(|v| *v == 8.0));
}

#[test]
fn test_bundled_linear_model_classifies_windows() {
    let sensors = SensorSet::accelerometer_only();
    let loader = LinearLoader::for_sensors(&sensors);
    let model = BUNDLED_ACCELEROMETER_MODEL;

    let source = ManualSource::new(64);
    let events = Events::default();
    let mut session = Session::new(SessionConfig::new(sensors, 4), source)
        .unwrap()
        .with_observer(Box::new(events.clone()));
    session.init(&loader, model).unwrap();
    assert!(session.is_classifier_available());
    session.start().unwrap();
    events.take();

    for t in 0..4 {
        let v = t as f32 * 0.1;
        session.feed(SensorId::Accelerometer, &[v, 9.8, -v]).unwrap();
    }

    let labels: Vec<_> = events
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Activity(label) => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(labels.len(), 1);
    assert!(matches!(labels[0], ActivityLabel::Activity(index) if index < 6));
}

#[test]
fn test_close_is_idempotent() {
    let windows = Arc::new(Mutex::new(Vec::new()));
    let loader = recording_loader(vec![0.0; 6], windows);
    let (mut session, injector, _events) = started_session(SensorSet::full(), 4, &loader);

    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!injector.push(SensorId::Accelerometer, &[0.0; 3]));
    assert!(session.poll(Duration::from_millis(1)).is_err());
}

#[test]
fn test_default_config_loads_bundled_classifier() {
    let config = Config::default();
    assert!(config.model_path.is_none());

    let sensors = config.sensors.sensor_set();
    let loader = LinearLoader::for_sensors(&sensors);
    let mut session =
        Session::new(SessionConfig::new(sensors, config.num_timesteps), ManualSource::new(8))
            .unwrap();
    session.init(&loader, config.sensors.bundled_model()).unwrap();

    assert!(session.is_classifier_available());
}

#[test]
fn test_non_finite_reading_never_reaches_classifier() {
    let windows = Arc::new(Mutex::new(Vec::new()));
    let loader = recording_loader(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0], Arc::clone(&windows));
    let (mut session, injector, events) =
        started_session(SensorSet::accelerometer_only(), 1, &loader);

    injector.push(SensorId::Accelerometer, &[0.0, f32::INFINITY, 9.8]);
    injector.push(SensorId::Accelerometer, &[0.0, 0.5, 9.8]);

    assert!(matches!(
        session.poll(Duration::from_millis(100)),
        Err(SessionError::Feed(FeedError::NonFinite { axis: 1 }))
    ));
    assert!(events.take().is_empty());
    assert!(windows.lock().unwrap().is_empty());

    // The valid reading queued behind it is fused on the next poll
    assert_eq!(session.poll(Duration::from_millis(100)).unwrap(), 1);
    assert_eq!(
        events.take(),
        vec![
            Event::Activity(ActivityLabel::Activity(1)),
            Event::Progress(0, 1, None),
        ]
    );
    assert_eq!(session.telemetry().stats().samples_rejected, 1);
}

#[test]
fn test_scores_without_finite_value_are_inference_errors() {
    struct NanScores;

    impl Classifier for NanScores {
        fn infer(&mut self, _window: &Window) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![f32::NAN; 6])
        }
    }

    let loader = |_model: &[u8]| -> Result<Box<dyn Classifier>, LoadError> {
        Ok(Box::new(NanScores))
    };
    let (mut session, _injector, events) =
        started_session(SensorSet::accelerometer_only(), 1, &loader);

    session.feed(SensorId::Accelerometer, &[0.0, 0.0, 9.8]).unwrap();

    assert_eq!(events.take(), vec![Event::Progress(0, 1, None)]);
    let stats = session.telemetry().stats();
    assert_eq!(stats.inference_failures, 1);
    assert_eq!(stats.inferences, 0);
}
