//! Replay engine
//!
//! Executes an invocation stream strictly in order: later records use
//! capabilities created by earlier ones. The first failed call ends the
//! replay; nothing is retried or undone.

use crate::builder::BootstrapStream;
use crate::error::{BootError, ReplayError};
use crate::stream::{InvocationRecord, InvocationStream};
use crate::untyped::{self, BootInfoUntypeds, UntypedInfo};
use sel4_platform::{Kernel, Word};

/// Decode the record at `offset` and issue all of its calls.
///
/// Returns the offset of the next record.
pub fn replay_one<K: Kernel + ?Sized>(
    kernel: &mut K,
    words: &[Word],
    offset: usize,
    index: usize,
) -> Result<usize, ReplayError> {
    let (record, next) = InvocationRecord::decode(words, offset, index)?;
    execute(kernel, &record, index)?;
    Ok(next)
}

fn execute<K: Kernel + ?Sized>(
    kernel: &mut K,
    record: &InvocationRecord<'_>,
    index: usize,
) -> Result<(), ReplayError> {
    for iteration in 0..record.iterations() {
        record
            .issue(kernel, iteration)
            .map_err(|error| ReplayError::Invocation {
                index,
                iteration,
                error,
            })?;
    }
    Ok(())
}

/// Outcome of replaying one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayStats {
    /// Records replayed
    pub records: usize,
    /// Kernel calls issued
    pub calls: usize,
    /// Stream words consumed
    pub words: usize,
}

/// Replay every record of `stream`
pub fn replay_all<K: Kernel + ?Sized>(
    kernel: &mut K,
    stream: &InvocationStream<'_>,
) -> Result<ReplayStats, ReplayError> {
    let words = stream.words();
    let mut stats = ReplayStats::default();
    for index in 0..stream.count() {
        let (record, next) = InvocationRecord::decode(words, stats.words, index)?;
        execute(kernel, &record, index)?;
        stats.words = next;
        stats.records += 1;
        stats.calls += record.iterations();
    }
    Ok(stats)
}

/// Provides the system stream once the bootstrap phase has mapped it
pub trait SystemStreamSource {
    /// `None` if the stream could not be located
    fn system_stream(&mut self) -> Option<InvocationStream<'_>>;
}

impl<'a> SystemStreamSource for InvocationStream<'a> {
    fn system_stream(&mut self) -> Option<InvocationStream<'_>> {
        Some(*self)
    }
}

/// Outcome of the full boot sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootSummary {
    pub bootstrap: ReplayStats,
    pub system: ReplayStats,
}

/// Two-phase boot: reconcile untypeds, replay the bootstrap stream, then
/// the system stream it made reachable.
pub fn boot<K, S>(
    kernel: &mut K,
    untypeds: &BootInfoUntypeds<'_>,
    expected: &UntypedInfo,
    bootstrap: &BootstrapStream,
    source: &mut S,
) -> Result<BootSummary, BootError>
where
    K: Kernel + ?Sized,
    S: SystemStreamSource + ?Sized,
{
    untyped::reconcile(untypeds, expected)?;

    let bootstrap = replay_all(kernel, &bootstrap.stream()).map_err(BootError::Bootstrap)?;
    log::info!(
        "completed bootstrap invocations ({} records, {} calls)",
        bootstrap.records,
        bootstrap.calls
    );

    let stream = source
        .system_stream()
        .ok_or(BootError::SystemStreamUnavailable)?;
    let system = replay_all(kernel, &stream).map_err(BootError::System)?;
    log::info!(
        "completed system invocations ({} records, {} calls)",
        system.records,
        system.calls
    );

    Ok(BootSummary { bootstrap, system })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Increments, Invocation, StreamBuilder};
    use sel4_mock::MockKernel;
    use sel4_platform::{Arch, InvocationLabel, KernelError};

    fn three_records() -> crate::StreamBuf {
        let mut builder = StreamBuilder::new();
        builder
            .push(Invocation::new(InvocationLabel::UntypedRetype, 1).mrs(&[4, 12, 0, 0, 20, 1]))
            .unwrap()
            .push(Invocation::new(InvocationLabel::TcbResume, 10).repeat(
                3,
                Increments {
                    service: 1,
                    ..Default::default()
                },
            ))
            .unwrap()
            .push(Invocation::new(InvocationLabel::TcbSuspend, 20))
            .unwrap();
        builder.finish()
    }

    #[test]
    fn test_replay_one_returns_next_offset() {
        let buf = three_records();
        let mut kernel = MockKernel::new(Arch::Aarch64);
        let next = replay_one(&mut kernel, buf.words(), 0, 0).unwrap();
        assert_eq!(next, 8);
        assert_eq!(kernel.calls().count(), 1);
    }

    #[test]
    fn test_replay_all_stats() {
        let buf = three_records();
        let mut kernel = MockKernel::new(Arch::Aarch64);
        let stats = replay_all(&mut kernel, &buf.stream()).unwrap();
        assert_eq!(
            stats,
            ReplayStats {
                records: 3,
                calls: 5,
                words: buf.words().len()
            }
        );
    }

    #[test]
    fn test_failure_reports_index_and_iteration() {
        let buf = three_records();
        let mut kernel = MockKernel::new(Arch::Aarch64);
        // Call #3 is the third iteration of record 1.
        kernel.fail_call(3, KernelError::InvalidCapability);
        let err = replay_all(&mut kernel, &buf.stream()).unwrap_err();
        assert_eq!(
            err,
            ReplayError::Invocation {
                index: 1,
                iteration: 2,
                error: KernelError::InvalidCapability
            }
        );
        // Nothing after the failure was issued.
        assert_eq!(kernel.calls().count(), 4);
    }

    #[test]
    fn test_system_stream_unavailable() {
        struct Missing;
        impl SystemStreamSource for Missing {
            fn system_stream(&mut self) -> Option<InvocationStream<'_>> {
                None
            }
        }

        let mut kernel = MockKernel::new(Arch::Aarch64);
        let bootstrap = BootstrapStream::new(0, &[]).unwrap();
        let err = boot(
            &mut kernel,
            &BootInfoUntypeds::new(Default::default(), &[]),
            &UntypedInfo::default(),
            &bootstrap,
            &mut Missing,
        )
        .unwrap_err();
        assert_eq!(err, BootError::SystemStreamUnavailable);
    }
}
