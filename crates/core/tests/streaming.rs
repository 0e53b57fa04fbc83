use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use facestream_core::{
    envelope::{self, Payload},
    Bone, ChannelPath, Connector, CooperativeLoop, Disconnect, KeyframeLog, MorphRig, PollDriver,
    PoseAxis, Result, Rig, RigDescriptor, Scene, Scheduler, Session, StandaloneHost, Status,
    StreamConfig, StreamError, Subscriber, TargetId, Tick,
};

type Inbox = Rc<RefCell<VecDeque<Vec<Vec<u8>>>>>;

/// Subscriber reading from a queue the test keeps a handle to.
struct QueueSubscriber {
    inbox: Inbox,
    open: bool,
}

impl Subscriber for QueueSubscriber {
    fn poll_ready(&mut self) -> Result<bool> {
        if !self.open {
            return Err(StreamError::EndpointAlreadyClosed);
        }
        Ok(!self.inbox.borrow().is_empty())
    }

    fn recv_multipart(&mut self) -> Result<Vec<Vec<u8>>> {
        self.inbox
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| StreamError::msg("empty inbox"))
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(StreamError::EndpointAlreadyClosed);
        }
        self.open = false;
        Ok(())
    }
}

struct QueueConnector {
    inbox: Inbox,
}

impl Connector for QueueConnector {
    fn open(&mut self, _endpoint: &str) -> Result<Box<dyn Subscriber>> {
        Ok(Box::new(QueueSubscriber {
            inbox: self.inbox.clone(),
            open: true,
        }))
    }
}

struct Harness {
    inbox: Inbox,
    host: StandaloneHost,
    session: Session,
    driver: PollDriver,
    scheduler: CooperativeLoop,
}

impl Harness {
    fn new(config: StreamConfig, anchor: i64, rigs: Vec<MorphRig>) -> Self {
        let mut scene = Scene::new();
        for rig in rigs {
            scene.add(rig);
        }
        scene.select_all();

        let inbox: Inbox = Rc::default();
        let host = StandaloneHost::new(scene, KeyframeLog::at_frame(anchor));
        let mut session = Session::new(config.clone());
        let mut scheduler = CooperativeLoop::new();
        let mut connector = QueueConnector {
            inbox: inbox.clone(),
        };
        session
            .connect(&mut connector, &host, &mut scheduler)
            .expect("connect");

        Self {
            inbox,
            host,
            session,
            driver: PollDriver::new(&config),
            scheduler,
        }
    }

    fn push(&self, payload: &str) {
        self.inbox.borrow_mut().push_back(vec![
            b"facsvatar".to_vec(),
            b"0".to_vec(),
            payload.as_bytes().to_vec(),
        ]);
    }

    fn tick(&mut self) -> Tick {
        self.driver.tick(&mut self.session, &mut self.host)
    }

    fn rig(&self, name: &str) -> &dyn Rig {
        self.host.scene.target(&TargetId::new(name)).expect("rig")
    }
}

fn approx(a: f32, b: f32) {
    assert!((a - b).abs() <= 1e-6, "left={a} right={b}");
}

fn face() -> MorphRig {
    MorphRig::new(&RigDescriptor {
        name: "face".into(),
        shape_keys: Some(vec!["SmileL".into(), "JawOpen".into()]),
        head_neck_bones: true,
    })
}

fn recording() -> StreamConfig {
    let mut config = StreamConfig::default();
    config.toggles.keyframing = true;
    config
}

#[test]
fn recorded_blendshape_lands_at_anchor_plus_frame() {
    let mut harness = Harness::new(recording(), 100, vec![face()]);
    harness.push(r#"{"frame":5,"blendshapes":{"SmileL":0.8}}"#);

    assert!(matches!(harness.tick(), Tick::Reschedule(_)));

    let records = harness.host.timeline.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].frame, 105);
    assert_eq!(records[0].value, 0.8);
    assert_eq!(records[0].channel, ChannelPath::ShapeKey("SmileL".into()));
    assert_eq!(harness.rig("face").shape_key("SmileL"), Some(0.8));
}

#[test]
fn partial_pose_leaves_missing_axis_untouched() {
    let mut harness = Harness::new(StreamConfig::default(), 0, vec![face()]);
    harness.push(r#"{"frame":1,"pose":{"pose_Rz":0.4}}"#);
    harness.tick();
    harness.push(r#"{"frame":2,"pose":{"pose_Rx":0.2,"pose_Ry":0.1}}"#);
    harness.tick();

    let rig = harness.rig("face");
    approx(rig.bone_angle(Bone::Head, PoseAxis::Pitch).unwrap(), 0.19);
    approx(rig.bone_angle(Bone::Neck, PoseAxis::Pitch).unwrap(), 0.10);
    approx(rig.bone_angle(Bone::Head, PoseAxis::Yaw).unwrap(), -0.095);
    approx(rig.bone_angle(Bone::Neck, PoseAxis::Yaw).unwrap(), -0.05);
    approx(rig.bone_angle(Bone::Head, PoseAxis::Roll).unwrap(), -0.38);
    approx(rig.bone_angle(Bone::Neck, PoseAxis::Roll).unwrap(), -0.2);
}

#[test]
fn idle_tick_mutates_nothing_and_reschedules() {
    let mut harness = Harness::new(recording(), 0, vec![face()]);

    assert!(matches!(harness.tick(), Tick::Reschedule(_)));
    assert!(harness.host.timeline.records().is_empty());
    assert_eq!(harness.rig("face").shape_key("SmileL"), Some(0.0));
    assert_eq!(harness.driver.stats().frames, 0);
}

#[test]
fn one_frame_per_tick_under_backlog() {
    let mut harness = Harness::new(StreamConfig::default(), 0, vec![face()]);
    harness.push(r#"{"frame":1,"blendshapes":{"JawOpen":0.1}}"#);
    harness.push(r#"{"frame":2,"blendshapes":{"JawOpen":0.2}}"#);

    harness.tick();

    assert_eq!(harness.rig("face").shape_key("JawOpen"), Some(0.1));
    assert_eq!(harness.inbox.borrow().len(), 1);
}

#[test]
fn bad_messages_are_skipped_and_polling_continues() {
    let mut harness = Harness::new(StreamConfig::default(), 0, vec![face()]);
    harness.inbox.borrow_mut().push_back(vec![b"only-topic".to_vec()]);
    harness.push("not json");
    harness.push(r#"{"frame":3,"blendshapes":{"JawOpen":0.5}}"#);

    for _ in 0..3 {
        assert!(matches!(harness.tick(), Tick::Reschedule(_)));
    }

    assert_eq!(harness.driver.stats().rejected, 2);
    assert_eq!(harness.driver.stats().frames, 1);
    assert_eq!(harness.rig("face").shape_key("JawOpen"), Some(0.5));
    assert_eq!(
        harness.session.last_message(),
        Some(r#"{"frame":3,"blendshapes":{"JawOpen":0.5}}"#)
    );
}

#[test]
fn static_targeting_keeps_the_connect_snapshot() {
    let mut config = StreamConfig::default();
    config.toggles.dynamic_targeting = false;
    let other = MorphRig::new(&RigDescriptor::open("other"));
    let mut harness = Harness::new(config, 0, vec![face(), other]);
    harness.host.scene.select([TargetId::new("other")]);

    harness.push(r#"{"frame":1,"blendshapes":{"JawOpen":0.3}}"#);
    harness.tick();

    assert_eq!(harness.rig("face").shape_key("JawOpen"), Some(0.3));
    assert_eq!(harness.rig("other").shape_key("JawOpen"), Some(0.3));
}

#[test]
fn dynamic_targeting_follows_the_selection() {
    let other = MorphRig::new(&RigDescriptor::open("other"));
    let mut harness = Harness::new(StreamConfig::default(), 0, vec![face(), other]);
    harness.host.scene.select([TargetId::new("other")]);

    harness.push(r#"{"frame":1,"blendshapes":{"JawOpen":0.3}}"#);
    harness.tick();

    assert_eq!(harness.rig("face").shape_key("JawOpen"), Some(0.0));
    assert_eq!(harness.rig("other").shape_key("JawOpen"), Some(0.3));
    assert_eq!(harness.session.targets(), &[TargetId::new("other")]);
}

#[test]
fn failing_target_does_not_block_others() {
    let prop = MorphRig::new(&RigDescriptor {
        name: "prop".into(),
        shape_keys: Some(Vec::new()),
        head_neck_bones: false,
    });
    let mut harness = Harness::new(recording(), 10, vec![face(), prop]);
    harness.push(r#"{"frame":0,"blendshapes":{"SmileL":0.6},"pose":{"pose_Rx":0.1}}"#);

    harness.tick();

    let rig = harness.rig("face");
    assert_eq!(rig.shape_key("SmileL"), Some(0.6));
    approx(rig.bone_angle(Bone::Head, PoseAxis::Pitch).unwrap(), 0.095);
    assert!(harness
        .host
        .timeline
        .records()
        .iter()
        .all(|record| record.target == TargetId::new("face") && record.frame == 10));
    assert_eq!(harness.host.timeline.records().len(), 3);
}

#[test]
fn recording_can_start_mid_session() {
    let mut harness = Harness::new(StreamConfig::default(), 20, vec![face()]);
    harness.push(r#"{"frame":1,"blendshapes":{"SmileL":0.2}}"#);
    harness.tick();
    assert!(harness.host.timeline.records().is_empty());

    harness.driver.recorder_mut().start();
    harness.push(r#"{"frame":2,"blendshapes":{"SmileL":0.4}}"#);
    harness.tick();

    let records = harness.host.timeline.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].frame, 22);
    assert_eq!(harness.driver.stats().keyframes, 1);

    harness.driver.recorder_mut().stop();
    harness.push(r#"{"frame":3,"blendshapes":{"SmileL":0.6}}"#);
    harness.tick();
    assert_eq!(harness.host.timeline.records().len(), 1);
    assert_eq!(harness.rig("face").shape_key("SmileL"), Some(0.6));
}

#[test]
fn out_of_range_frame_index_keeps_polling() {
    let mut harness = Harness::new(recording(), 100, vec![face()]);
    harness.push(r#"{"frame":9223372036854775807,"blendshapes":{"SmileL":0.7}}"#);
    harness.push(r#"{"frame":1,"blendshapes":{"SmileL":0.9}}"#);

    assert!(matches!(harness.tick(), Tick::Reschedule(_)));
    assert_eq!(harness.rig("face").shape_key("SmileL"), Some(0.7));
    assert!(harness.host.timeline.records().is_empty());

    assert!(matches!(harness.tick(), Tick::Reschedule(_)));
    assert_eq!(harness.host.timeline.records()[0].frame, 101);
}

#[test]
fn disconnect_stops_future_ticks() {
    let mut harness = Harness::new(StreamConfig::default(), 0, vec![face()]);

    assert_eq!(
        harness.session.disconnect(&mut harness.scheduler),
        Disconnect::Closed
    );
    assert_eq!(harness.session.status(), Status::Disconnected);
    assert!(!harness.scheduler.is_registered());

    harness.push(r#"{"frame":1,"blendshapes":{"JawOpen":0.9}}"#);
    assert_eq!(harness.tick(), Tick::Stop);
    assert_eq!(harness.rig("face").shape_key("JawOpen"), Some(0.0));
}

#[test]
fn stop_predicate_disconnects_from_the_loop() {
    let mut harness = Harness::new(StreamConfig::default(), 0, vec![face()]);
    harness.push(r#"{"frame":1,"blendshapes":{"JawOpen":0.4}}"#);

    let mut remaining = 3;
    let ticks = harness.scheduler.run_until(
        &mut harness.driver,
        &mut harness.session,
        &mut harness.host,
        |_, _| {
            remaining -= 1;
            remaining < 0
        },
    );

    assert_eq!(ticks, 3);
    assert_eq!(harness.session.status(), Status::Disconnected);
    assert_eq!(harness.rig("face").shape_key("JawOpen"), Some(0.4));
}

#[test]
fn published_payload_decodes_to_the_same_channels() {
    let payload: Payload =
        serde_json::from_str(r#"{"frame":7,"blendshapes":{"SmileL":0.25},"pose":{"pose_Ry":-0.5}}"#)
            .unwrap();
    let wire = envelope::encode(b"t", b"ts", &payload).unwrap();
    let frame = envelope::decode(&wire).unwrap();

    assert_eq!(Payload::from(&frame), payload);
}
