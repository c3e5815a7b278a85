//! Two-pass scrub engine.

use crate::options::ScrubOptions;
use crate::progress::{ProgressSink, SessionState};
use crate::report::{BlockFailure, FailureKind, Pass, ScrubResult};
use blkscrub_block::{AlignedBuf, BlockDevice, resolve_geometry};
use blkscrub_error::{Result, ScrubError};
use blkscrub_pattern::{PatternGenerator, hex_dump};
use blkscrub_types::{BlockNumber, Geometry, Seed};
use std::mem;
use tracing::{debug, error, info, trace, warn};

/// Bytes of the first pattern shown at trace level.
const TRACE_DUMP_BYTES: usize = 64;

/// Destructive write/read-verify scrub of one device.
///
/// Owns the device for the whole session; the device is dropped (and its
/// descriptor closed) when [`ScrubEngine::run`] returns.
///
/// Both passes walk the blocks in ascending order and draw patterns from the
/// same [`PatternGenerator`], rewound to the session seed at the start of
/// each pass. The n-th generated pattern always belongs to block n: the
/// pattern for a block is produced before that block's I/O.
pub struct ScrubEngine<D: BlockDevice> {
    device: D,
    geometry: Geometry,
    options: ScrubOptions,
    generator: PatternGenerator,
    /// Written from in the write pass, read into in the verify pass.
    io_buf: AlignedBuf,
    /// Independent copy of the current block's pattern.
    reference: AlignedBuf,
    state: SessionState,
}

/// Result of one block's I/O: `Ok(None)` clean, `Ok(Some(_))` non-fatal
/// failure, `Err(_)` failure that ends the pass.
type BlockOutcome = std::result::Result<Option<BlockFailure>, BlockFailure>;

impl<D: BlockDevice> ScrubEngine<D> {
    /// Resolve the device geometry and prepare buffers.
    ///
    /// Fails with [`ScrubError::GeometryUnavailable`] if the capacity query
    /// fails; no block I/O has happened at that point.
    pub fn new(device: D, options: ScrubOptions) -> Result<Self> {
        let geometry = resolve_geometry(&device)?;
        Self::with_geometry(device, geometry, options)
    }

    /// Use a geometry the caller already resolved.
    pub fn with_geometry(device: D, geometry: Geometry, options: ScrubOptions) -> Result<Self> {
        let seed = options.seed.unwrap_or_else(Seed::from_clock);
        let io_buf = AlignedBuf::new(geometry.block_len())?;
        let reference = io_buf.try_clone()?;
        Ok(Self {
            device,
            geometry,
            generator: PatternGenerator::new(options.fill_method, seed),
            options,
            io_buf,
            reference,
            state: SessionState::Idle,
        })
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Seed captured for this session.
    #[must_use]
    pub fn seed(&self) -> Seed {
        self.generator.seed()
    }

    /// Run the write pass, then the verify pass unless the session is
    /// wipe-only or the write pass hit an I/O error, then flush.
    pub fn run(mut self, sink: &mut dyn ProgressSink) -> ScrubResult {
        let seed = self.generator.seed();
        let mut result = ScrubResult::new(
            self.geometry,
            self.options.fill_method,
            seed,
            self.options.wipe_only,
        );
        info!(
            geometry = %self.geometry,
            fill_method = %self.options.fill_method,
            seed = seed.0,
            wipe_only = self.options.wipe_only,
            "scrub session starting"
        );

        self.transition(SessionState::Writing, sink);
        result.blocks_written = self.run_pass(Pass::Write, seed, &mut result, sink);

        if self.options.wipe_only {
            info!("wipe-only session; skipping verify pass");
        } else if result.has_aborting_failure() {
            warn!("write pass failed; skipping verify pass");
        } else {
            self.transition(SessionState::Reading, sink);
            result.verify_ran = true;
            result.blocks_verified = self.run_pass(Pass::Verify, seed, &mut result, sink);
        }

        sink.on_sync();
        if let Err(err) = self.device.sync() {
            Self::report(BlockFailure::sync(os_detail(&err)), &mut result, sink);
        }

        self.transition(SessionState::Done, sink);
        info!(
            passed = result.passed(),
            blocks_written = result.blocks_written,
            blocks_verified = result.blocks_verified,
            failures = result.failures.len(),
            "scrub session finished"
        );
        result
    }

    /// One sequential pass over every block. Returns the number of blocks
    /// whose I/O completed.
    fn run_pass(
        &mut self,
        pass: Pass,
        seed: Seed,
        result: &mut ScrubResult,
        sink: &mut dyn ProgressSink,
    ) -> u64 {
        let geometry = self.geometry;
        let block_count = geometry.block_count();
        let interval = self.options.progress_interval();

        self.generator.reseed(seed);
        sink.on_pass_start(pass, &geometry);
        debug!(%pass, block_count, "pass started");

        let mut done: u64 = 0;
        for block in geometry.blocks() {
            if block.0 == 0 || self.generator.varies_per_block() {
                self.next_pattern();
                if block.0 == 0 {
                    let shown = self.reference.len().min(TRACE_DUMP_BYTES);
                    trace!(
                        %pass,
                        pattern = %hex_dump(&self.reference[..shown]),
                        "first block pattern"
                    );
                }
            }

            if let Err(failure) = self.position(pass, block) {
                Self::report(failure, result, sink);
                break;
            }

            if block.0 % interval == 0 || geometry.is_last(block) {
                sink.on_progress(pass, block, block_count);
            }

            let outcome = match pass {
                Pass::Write => self.write_block(block),
                Pass::Verify => self.verify_block(block),
            };
            match outcome {
                Ok(None) => done += 1,
                Ok(Some(failure)) => {
                    done += 1;
                    Self::report(failure, result, sink);
                }
                Err(failure) => {
                    Self::report(failure, result, sink);
                    break;
                }
            }
        }

        sink.on_pass_end(pass, done);
        debug!(%pass, blocks_done = done, "pass finished");
        done
    }

    /// Generate the next pattern into the I/O buffer and refresh the
    /// reference copy.
    fn next_pattern(&mut self) {
        self.generator.generate(&mut self.io_buf);
        self.reference.copy_from_slice(&self.io_buf);
    }

    fn position(
        &mut self,
        pass: Pass,
        block: BlockNumber,
    ) -> std::result::Result<(), BlockFailure> {
        let seek_failed =
            |detail| BlockFailure::at_block(pass, block, FailureKind::SeekFailed, detail);
        let offset = self
            .geometry
            .offset_of(block)
            .ok_or_else(|| seek_failed("block offset overflows".to_owned()))?;
        match self.device.seek_to(offset) {
            Ok(landed) if landed == offset.0 => Ok(()),
            Ok(landed) => Err(seek_failed(format!(
                "positioned at byte {landed}, expected {offset}"
            ))),
            Err(err) => Err(seek_failed(os_detail(&err))),
        }
    }

    fn write_block(&mut self, block: BlockNumber) -> BlockOutcome {
        let expected = self.io_buf.len();
        let write_failed =
            |detail| BlockFailure::at_block(Pass::Write, block, FailureKind::WriteFailed, detail);
        match self.device.write(&self.io_buf) {
            Ok(written) if written == expected => Ok(None),
            Ok(written) => Err(write_failed(format!(
                "short write: {written} of {expected} bytes"
            ))),
            Err(err) => Err(write_failed(os_detail(&err))),
        }
    }

    fn verify_block(&mut self, block: BlockNumber) -> BlockOutcome {
        let expected = self.io_buf.len();
        let read_failed =
            |detail| BlockFailure::at_block(Pass::Verify, block, FailureKind::ReadFailed, detail);
        match self.device.read(&mut self.io_buf) {
            Ok(read) if read == expected => {}
            Ok(read) => {
                return Err(read_failed(format!("short read: {read} of {expected} bytes")));
            }
            Err(err) => return Err(read_failed(os_detail(&err))),
        }

        Ok(describe_mismatch(&self.reference, &self.io_buf).map(|detail| {
            BlockFailure::at_block(Pass::Verify, block, FailureKind::MismatchFailed, detail)
        }))
    }

    fn report(failure: BlockFailure, result: &mut ScrubResult, sink: &mut dyn ProgressSink) {
        if failure.kind == FailureKind::MismatchFailed {
            warn!(block = ?failure.block, detail = %failure.detail, "pattern mismatch");
        } else {
            error!(
                kind = %failure.kind,
                block = ?failure.block,
                detail = %failure.detail,
                "device I/O failed"
            );
        }
        sink.on_failure(&failure);
        result.record(failure);
    }

    fn transition(&mut self, to: SessionState, sink: &mut dyn ProgressSink) {
        let from = mem::replace(&mut self.state, to);
        debug!(?from, ?to, "session state");
        sink.on_state_change(from, to);
    }
}

/// OS error text without the crate's own prefix.
fn os_detail(err: &ScrubError) -> String {
    match err {
        ScrubError::Io(source) => source.to_string(),
        other => other.to_string(),
    }
}

/// `None` if the buffers match, otherwise where and how much they differ.
fn describe_mismatch(expected: &[u8], actual: &[u8]) -> Option<String> {
    let first = expected.iter().zip(actual).position(|(e, a)| e != a)?;
    let differing = expected.iter().zip(actual).filter(|(e, a)| e != a).count();
    Some(format!(
        "first difference at byte {first} (expected {:#04x}, read {:#04x}), {differing} bytes differ",
        expected[first], actual[first]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullProgress, RecordingProgress};
    use blkscrub_block::mem::{FaultPlan, FaultyBlockDevice, IoStats, MemBlockDevice};
    use blkscrub_types::FillMethod;

    fn options(fill_method: FillMethod) -> ScrubOptions {
        ScrubOptions {
            fill_method,
            seed: Some(Seed(42)),
            ..ScrubOptions::default()
        }
    }

    fn faulty(plan: FaultPlan) -> FaultyBlockDevice {
        FaultyBlockDevice::new(MemBlockDevice::new(4096, 512), plan)
    }

    #[test]
    fn states_follow_full_session_lifecycle() {
        let dev = MemBlockDevice::new(4096, 512);
        let mut sink = RecordingProgress::new();
        let result = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut sink);

        assert!(result.passed());
        assert_eq!(
            sink.states(),
            vec![
                SessionState::Writing,
                SessionState::Reading,
                SessionState::Done
            ]
        );
    }

    #[test]
    fn wipe_only_goes_straight_from_writing_to_done() {
        let dev = MemBlockDevice::new(4096, 512);
        let mut sink = RecordingProgress::new();
        let opts = ScrubOptions {
            wipe_only: true,
            ..options(FillMethod::Random)
        };
        let result = ScrubEngine::new(dev.clone(), opts)
            .expect("engine")
            .run(&mut sink);

        assert!(result.passed());
        assert!(!result.verify_ran);
        assert_eq!(sink.states(), vec![SessionState::Writing, SessionState::Done]);
        assert_eq!(sink.passes_started(), vec![Pass::Write]);
        assert_eq!(dev.stats().reads, 0);
        assert_eq!(dev.stats().syncs, 1);
    }

    #[test]
    fn progress_is_reported_at_interval_and_on_last_block() {
        let dev = MemBlockDevice::new(4096, 512);
        let mut sink = RecordingProgress::new();
        let opts = ScrubOptions {
            progress_interval: 3,
            ..options(FillMethod::Fixed)
        };
        ScrubEngine::new(dev, opts).expect("engine").run(&mut sink);

        assert_eq!(sink.progress_blocks(Pass::Write), vec![0, 3, 6, 7]);
        assert_eq!(sink.progress_blocks(Pass::Verify), vec![0, 3, 6, 7]);
    }

    #[test]
    fn nth_random_pattern_lands_on_nth_block() {
        let dev = MemBlockDevice::new(4096, 512);
        let result = ScrubEngine::new(dev.clone(), options(FillMethod::Random))
            .expect("engine")
            .run(&mut NullProgress);
        assert!(result.passed());

        let mut generator = PatternGenerator::new(FillMethod::Random, Seed(42));
        for i in 0..8 {
            let mut expected = vec![0_u8; 512];
            generator.generate(&mut expected);
            assert_eq!(
                dev.block(BlockNumber(i)).expect("block"),
                expected,
                "block {i} holds the wrong pattern"
            );
        }
    }

    #[test]
    fn io_happens_in_ascending_block_order() {
        let dev = MemBlockDevice::new(4096, 512);
        ScrubEngine::new(dev.clone(), options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut NullProgress);

        let expected: Vec<u64> = (0..8).map(|i| i * 512).collect();
        let stats = dev.stats();
        assert_eq!(stats.write_offsets, expected);
        assert_eq!(stats.read_offsets, expected);
    }

    #[test]
    fn short_write_is_a_write_failure() {
        let dev = faulty(FaultPlan {
            short_write: vec![BlockNumber(2)],
            ..FaultPlan::default()
        });
        let result = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut NullProgress);

        assert_eq!(result.failure_kind, FailureKind::WriteFailed);
        assert_eq!(result.first_failure_block, Some(2));
        assert_eq!(result.blocks_written, 2);
        assert!(result.failures[0].detail.contains("short write: 256 of 512"));
        assert!(!result.verify_ran);
    }

    #[test]
    fn seek_error_aborts_write_pass() {
        let dev = faulty(FaultPlan {
            fail_seek: vec![BlockNumber(4)],
            ..FaultPlan::default()
        });
        let handle = dev.inner().clone();
        let result = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut NullProgress);

        assert_eq!(result.failure_kind, FailureKind::SeekFailed);
        assert_eq!(result.first_failure_block, Some(4));
        assert_eq!(handle.stats().writes, 4);
    }

    #[test]
    fn misplaced_seek_is_a_seek_failure() {
        let dev = faulty(FaultPlan {
            misplace_seek: vec![BlockNumber(1)],
            ..FaultPlan::default()
        });
        let result = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut NullProgress);

        assert_eq!(result.failure_kind, FailureKind::SeekFailed);
        assert!(result.failures[0].detail.contains("expected 512"));
    }

    #[test]
    fn read_error_aborts_verify_pass() {
        let dev = faulty(FaultPlan {
            fail_read: vec![BlockNumber(6)],
            ..FaultPlan::default()
        });
        let mut sink = RecordingProgress::new();
        let result = ScrubEngine::new(dev, options(FillMethod::Random))
            .expect("engine")
            .run(&mut sink);

        assert_eq!(result.failure_kind, FailureKind::ReadFailed);
        assert_eq!(result.first_failure_block, Some(6));
        assert_eq!(result.blocks_written, 8);
        assert_eq!(result.blocks_verified, 6);
        assert!(result.failures[0].detail.contains("os error"));
        assert_eq!(sink.failures().len(), 1);
    }

    #[test]
    fn short_read_is_a_read_failure() {
        let dev = faulty(FaultPlan {
            short_read: vec![BlockNumber(0)],
            ..FaultPlan::default()
        });
        let result = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut NullProgress);

        assert_eq!(result.failure_kind, FailureKind::ReadFailed);
        assert_eq!(result.blocks_verified, 0);
    }

    #[test]
    fn sync_failure_fails_an_otherwise_clean_session() {
        let dev = faulty(FaultPlan {
            fail_sync: true,
            ..FaultPlan::default()
        });
        let result = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .expect("engine")
            .run(&mut NullProgress);

        assert!(!result.passed());
        assert_eq!(result.failure_kind, FailureKind::SyncFailed);
        assert_eq!(result.blocks_verified, 8);
    }

    #[test]
    fn capacity_failure_prevents_any_io() {
        let dev = faulty(FaultPlan {
            fail_capacity: true,
            ..FaultPlan::default()
        });
        let handle = dev.inner().clone();
        let err = ScrubEngine::new(dev, options(FillMethod::Fixed))
            .err()
            .expect("geometry failure");
        assert!(matches!(err, ScrubError::GeometryUnavailable { .. }));
        assert_eq!(handle.stats(), IoStats::default());
    }

    #[test]
    fn device_smaller_than_a_block_passes_without_io() {
        let dev = MemBlockDevice::new(100, 512);
        let result = ScrubEngine::new(dev.clone(), options(FillMethod::Random))
            .expect("engine")
            .run(&mut NullProgress);

        assert!(result.passed());
        assert_eq!(result.blocks_processed(), 0);
        assert_eq!(dev.stats().writes, 0);
    }

    #[test]
    fn describe_mismatch_reports_first_offset_and_count() {
        let expected = [1_u8, 2, 3, 4];
        assert_eq!(describe_mismatch(&expected, &expected), None);
        let detail = describe_mismatch(&expected, &[1, 9, 3, 8]).expect("mismatch");
        assert_eq!(
            detail,
            "first difference at byte 1 (expected 0x02, read 0x09), 2 bytes differ"
        );
    }
}
