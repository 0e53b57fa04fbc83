//! Fixed-interval poll loop that moves frames from the subscriber onto rigs.
//!
//! Every tick does at most one non-blocking receive. Messages that pile up
//! faster than the tick rate are left behind on the transport; the rig only
//! ever sees the frame that was current when it was polled.

use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    envelope,
    mapping::{MappingSettings, PoseMapper},
    record::{Recorder, RecordingSettings},
    scene::Host,
    session::{Receive, Session},
    StreamConfig,
};

/// What the host should do with the poll callback after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Reschedule(Duration),
    Stop,
}

/// Host-side registration of the poll callback.
pub trait Scheduler {
    fn register(&mut self, first_delay: Duration);
    fn unregister(&mut self);
    fn is_registered(&self) -> bool;
}

/// Counters accumulated over the lifetime of a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks: u64,
    pub frames: u64,
    pub rejected: u64,
    pub mutations: u64,
    pub keyframes: u64,
}

#[derive(Debug)]
pub struct PollDriver {
    mapper: PoseMapper,
    recorder: Recorder,
    interval: Duration,
    stats: DriverStats,
}

impl PollDriver {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            mapper: PoseMapper::new(MappingSettings::from(&config.toggles)),
            recorder: Recorder::new(RecordingSettings {
                enabled: config.toggles.keyframing,
            }),
            interval: config.poll_interval(),
            stats: DriverStats::default(),
        }
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    /// One iteration of the receive-and-apply cycle.
    pub fn tick<H>(&mut self, session: &mut Session, host: &mut H) -> Tick
    where
        H: Host + ?Sized,
    {
        let parts = match session.receive() {
            Receive::Closed => return Tick::Stop,
            Receive::Idle => {
                self.stats.ticks += 1;
                return Tick::Reschedule(self.interval);
            }
            Receive::Message(parts) => parts,
        };
        self.stats.ticks += 1;

        let frame = match envelope::decode(&parts) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("dropping message: {err}");
                self.stats.rejected += 1;
                return Tick::Reschedule(self.interval);
            }
        };
        self.stats.frames += 1;
        debug!(
            topic = %String::from_utf8_lossy(&frame.topic),
            frame = frame.frame_index,
            "received frame"
        );

        if session.config().toggles.dynamic_targeting {
            session.refresh_targets(&*host);
        }
        let anchor = session.anchor().unwrap_or_default();

        for id in session.targets() {
            let Some(rig) = host.target_mut(id) else {
                warn!(object = %id, "target no longer in scene, skipping");
                continue;
            };
            let outcome = self.mapper.apply(&frame, rig);
            self.stats.mutations += outcome.mutations.len() as u64;
            let written = self
                .recorder
                .record(&mut *host, id, anchor, frame.frame_index, &outcome.mutations);
            self.stats.keyframes += written as u64;
        }

        Tick::Reschedule(self.interval)
    }
}

/// Single-threaded scheduler that re-arms the poll callback after each tick.
#[derive(Debug, Default)]
pub struct CooperativeLoop {
    next_due: Option<Instant>,
}

impl CooperativeLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the poll callback until it stops itself or `stop` asks for a
    /// disconnect. `stop` is checked before every tick on this thread.
    /// Returns the number of ticks executed.
    pub fn run_until<H, F>(
        &mut self,
        driver: &mut PollDriver,
        session: &mut Session,
        host: &mut H,
        mut stop: F,
    ) -> u64
    where
        H: Host + ?Sized,
        F: FnMut(&Session, &H) -> bool,
    {
        let mut ticks = 0;
        while let Some(due) = self.next_due {
            if stop(&*session, &*host) {
                session.disconnect(self);
                break;
            }
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
            self.fire(driver, session, host);
            ticks += 1;
        }
        ticks
    }

    /// Runs one tick if the callback is registered, ignoring the due time.
    pub fn step<H>(&mut self, driver: &mut PollDriver, session: &mut Session, host: &mut H) -> bool
    where
        H: Host + ?Sized,
    {
        if self.next_due.is_none() {
            return false;
        }
        self.fire(driver, session, host);
        true
    }

    fn fire<H>(&mut self, driver: &mut PollDriver, session: &mut Session, host: &mut H)
    where
        H: Host + ?Sized,
    {
        self.next_due = match driver.tick(session, host) {
            Tick::Reschedule(delay) => Some(Instant::now() + delay),
            Tick::Stop => None,
        };
    }
}

impl Scheduler for CooperativeLoop {
    fn register(&mut self, first_delay: Duration) {
        self.next_due = Some(Instant::now() + first_delay);
    }

    fn unregister(&mut self) {
        self.next_due = None;
    }

    fn is_registered(&self) -> bool {
        self.next_due.is_some()
    }
}
