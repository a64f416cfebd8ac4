use core::time::Duration;
use parking_lot::Mutex;
use std::{
    panic::resume_unwind,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{sync_channel, RecvTimeoutError},
        Arc,
    },
    thread,
};
use tracing::{debug, error};

use crate::{
    any::Key,
    errors::{BuildErrorKind, ResolveErrorKind, TimeoutReport},
    injector::{Injector, InjectorBuilder},
    trace::{TraceCallback, TraceInfo, TraceKind},
};

/// What the resolution engine of an assembly is doing, fed by its trace events
#[derive(Default)]
struct Progress {
    in_flight: Vec<Key>,
    last_requested: Option<Key>,
    last_created: Option<Key>,
    slowest: Option<(Key, Duration)>,
}

impl Progress {
    fn observe(&mut self, info: &TraceInfo) {
        match info.kind {
            TraceKind::InstanceRequest => self.last_requested = Some(info.requested),
            TraceKind::InstanceWillBeCreated => self.in_flight.push(info.requested),
            TraceKind::InstanceCreated => {
                if let Some(position) = self.in_flight.iter().rposition(|key| *key == info.requested) {
                    self.in_flight.remove(position);
                }
                self.last_created = Some(info.requested);

                let elapsed = info.elapsed.unwrap_or_default();
                if self.slowest.map_or(true, |(_, slowest)| elapsed > slowest) {
                    self.slowest = Some((info.requested, elapsed));
                }
            }
            TraceKind::InstanceReturned => {}
        }
    }

    fn report(&self) -> TimeoutReport {
        TimeoutReport {
            in_flight: self.in_flight.last().copied(),
            last_requested: self.last_requested,
            last_created: self.last_created,
            slowest: self.slowest,
        }
    }
}

/// Records the progress of one assembly. Events arriving after it finished are ignored.
#[derive(Default)]
struct Recorder {
    progress: Mutex<Progress>,
    finished: AtomicBool,
}

impl Recorder {
    fn observe(&self, info: &TraceInfo) {
        if !self.finished.load(Ordering::Acquire) {
            self.progress.lock().observe(info);
        }
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    fn report(&self) -> TimeoutReport {
        self.progress.lock().report()
    }
}

/// Assembles `builder` on a worker thread, waiting at most `timeout` for it.
///
/// A panic on the worker is resumed on the caller.
pub(crate) fn assemble(mut builder: InjectorBuilder, timeout: Duration) -> Result<Injector, BuildErrorKind> {
    let recorder = Arc::new(Recorder::default());

    let observer: TraceCallback = {
        let recorder = recorder.clone();
        let user = builder.trace.take();
        Arc::new(move |info: &TraceInfo| {
            recorder.observe(info);
            if let Some(user) = &user {
                user(info);
            }
        })
    };
    builder.trace = Some(observer);
    builder.timeout = None;

    let (done, finished) = sync_channel(1);
    let worker = thread::Builder::new()
        .name("bindery-assembly".to_owned())
        .spawn({
            let recorder = recorder.clone();
            move || {
                let result = builder.assemble();
                recorder.finish();
                // The receiver is gone once the deadline passed
                let _ = done.send(());
                result
            }
        })
        .map_err(|err| BuildErrorKind::Resolve(ResolveErrorKind::Provider(err.into())))?;

    match finished.recv_timeout(timeout) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => match worker.join() {
            Ok(result) => {
                debug!("Assembled before deadline");
                result
            }
            Err(payload) => resume_unwind(payload),
        },
        Err(RecvTimeoutError::Timeout) => {
            let err = BuildErrorKind::Timeout {
                timeout,
                report: recorder.report(),
            };
            error!("{}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Progress, Recorder};
    use crate::{
        any::Key,
        trace::{TraceInfo, TraceKind},
    };

    use core::time::Duration;

    struct Outer;
    struct Inner;

    fn created(key: Key, millis: u64) -> TraceInfo {
        TraceInfo {
            created_now: true,
            elapsed: Some(Duration::from_millis(millis)),
            ..TraceInfo::new(TraceKind::InstanceCreated, key, None)
        }
    }

    #[test]
    fn test_report() {
        let (outer, inner) = (Key::of::<Outer>(), Key::of::<Inner>());
        let mut progress = Progress::default();

        progress.observe(&TraceInfo::new(TraceKind::InstanceRequest, outer, None));
        progress.observe(&TraceInfo::new(TraceKind::InstanceWillBeCreated, outer, None));
        progress.observe(&TraceInfo::new(TraceKind::InstanceRequest, inner, Some(outer)));
        progress.observe(&TraceInfo::new(TraceKind::InstanceWillBeCreated, inner, Some(outer)));
        progress.observe(&created(inner, 5));

        let report = progress.report();
        assert_eq!(report.in_flight, Some(outer));
        assert_eq!(report.last_requested, Some(inner));
        assert_eq!(report.last_created, Some(inner));
        assert_eq!(report.slowest, Some((inner, Duration::from_millis(5))));

        progress.observe(&created(outer, 9));
        let report = progress.report();
        assert_eq!(report.in_flight, None);
        assert_eq!(report.slowest, Some((outer, Duration::from_millis(9))));
    }

    #[test]
    fn test_recorder_ignores_events_after_finish() {
        let (outer, inner) = (Key::of::<Outer>(), Key::of::<Inner>());
        let recorder = Recorder::default();

        recorder.observe(&TraceInfo::new(TraceKind::InstanceWillBeCreated, outer, None));
        recorder.finish();
        recorder.observe(&TraceInfo::new(TraceKind::InstanceWillBeCreated, inner, None));
        recorder.observe(&TraceInfo::new(TraceKind::InstanceWillBeCreated, inner, None));

        let report = recorder.report();
        assert_eq!(report.in_flight, Some(outer));
        assert_eq!(report.last_requested, None);
        assert_eq!(recorder.progress.lock().in_flight, [outer]);
    }
}
