//! Invocation stream decoding
//!
//! The build tool emits every kernel invocation needed to build the system
//! as a flat run of little-endian words. One record is:
//!
//! ```text
//! tag_word        low 32 bits: seL4 message info, high 32 bits: iterations - 1
//! service
//! caps[extra_caps]
//! mrs[length]
//! -- only when iterations > 1 --
//! stride_service
//! stride_caps[extra_caps]
//! stride_mrs[length]
//! ```
//!
//! Call `i` of a repeated record uses `base + i * stride` for the service and
//! every cap and message register. Arithmetic wraps like the unsigned words
//! it models.

use crate::error::ReplayError;
use sel4_platform::types::MSG_MAX_LENGTH;
use sel4_platform::{CPtr, Kernel, KernelError, MessageInfo, Word};

const TAG_INFO_MASK: Word = 0xffff_ffff;
const TAG_ITERATIONS_SHIFT: u32 = 32;

/// Per-iteration increments of a repeated record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stride<'a> {
    service: Word,
    caps: &'a [Word],
    mrs: &'a [Word],
}

/// One decoded invocation, borrowing its arguments from the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationRecord<'a> {
    info: MessageInfo,
    iterations: usize,
    service: CPtr,
    caps: &'a [Word],
    mrs: &'a [Word],
    stride: Option<Stride<'a>>,
}

impl<'a> InvocationRecord<'a> {
    /// Decode the record starting at `offset`.
    ///
    /// `index` is only used for error reporting. Returns the record and the
    /// offset of the next one.
    pub fn decode(words: &'a [Word], offset: usize, index: usize) -> Result<(Self, usize), ReplayError> {
        let header = words.get(offset..offset + 2).ok_or(ReplayError::Truncated {
            index,
            offset,
            needed: 2,
            available: words.len().saturating_sub(offset),
        })?;
        let tag = header[0];
        let service = header[1];

        let info = MessageInfo::from_word(tag & TAG_INFO_MASK);
        let iterations = (tag >> TAG_ITERATIONS_SHIFT) as usize + 1;
        let n_caps = info.extra_caps() as usize;
        let n_mrs = info.length() as usize;
        if n_mrs > MSG_MAX_LENGTH {
            return Err(ReplayError::MessageTooLong { index, length: n_mrs });
        }

        let args = n_caps + n_mrs;
        let body = if iterations > 1 { 2 * args + 1 } else { args };
        let start = offset + 2;
        let end = start + body;
        let body = words.get(start..end).ok_or(ReplayError::Truncated {
            index,
            offset,
            needed: 2 + body,
            available: words.len().saturating_sub(offset),
        })?;

        let (caps, rest) = body.split_at(n_caps);
        let (mrs, rest) = rest.split_at(n_mrs);
        let stride = if iterations > 1 {
            let (stride_caps, stride_mrs) = rest[1..].split_at(n_caps);
            Some(Stride {
                service: rest[0],
                caps: stride_caps,
                mrs: stride_mrs,
            })
        } else {
            None
        };

        Ok((
            Self {
                info,
                iterations,
                service,
                caps,
                mrs,
                stride,
            },
            end,
        ))
    }

    /// Tag sent with every call of this record
    pub const fn info(&self) -> MessageInfo {
        self.info
    }

    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Words this record occupies in the stream
    pub fn encoded_len(&self) -> usize {
        let args = self.caps.len() + self.mrs.len();
        2 + if self.stride.is_some() { 2 * args + 1 } else { args }
    }

    /// Service invoked by call `iteration`
    pub fn service_at(&self, iteration: usize) -> CPtr {
        let step = self.stride.map_or(0, |s| s.service);
        advance(self.service, step, iteration)
    }

    /// Extra capabilities of call `iteration`
    pub fn caps_at(&self, iteration: usize) -> impl Iterator<Item = CPtr> + '_ {
        let steps = self.stride.map_or(&[][..], |s| s.caps);
        strided(self.caps, steps, iteration)
    }

    /// Message registers of call `iteration`
    pub fn mrs_at(&self, iteration: usize) -> impl Iterator<Item = Word> + '_ {
        let steps = self.stride.map_or(&[][..], |s| s.mrs);
        strided(self.mrs, steps, iteration)
    }

    /// Stage and issue call `iteration` on `kernel`
    pub fn issue<K: Kernel + ?Sized>(&self, kernel: &mut K, iteration: usize) -> Result<(), KernelError> {
        for (idx, cap) in self.caps_at(iteration).enumerate() {
            kernel.set_cap(idx, cap);
        }
        for (idx, mr) in self.mrs_at(iteration).enumerate() {
            kernel.set_mr(idx, mr);
        }
        let reply = kernel.call(self.service_at(iteration), self.info);
        KernelError::check(reply.label())
    }
}

fn advance(base: Word, step: Word, iteration: usize) -> Word {
    base.wrapping_add(step.wrapping_mul(iteration as Word))
}

fn strided<'s>(
    base: &'s [Word],
    steps: &'s [Word],
    iteration: usize,
) -> impl Iterator<Item = Word> + 's {
    base.iter().enumerate().map(move |(idx, value)| {
        let step = steps.get(idx).copied().unwrap_or(0);
        advance(*value, step, iteration)
    })
}

/// An invocation stream: `count` records packed into `words`
///
/// `words` may be longer than the records need (the bootstrap stream lives
/// in a fixed-size array); trailing words are never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationStream<'a> {
    count: usize,
    words: &'a [Word],
}

impl<'a> InvocationStream<'a> {
    pub const fn new(count: usize, words: &'a [Word]) -> Self {
        Self { count, words }
    }

    /// Number of records
    pub const fn count(&self) -> usize {
        self.count
    }

    pub const fn words(&self) -> &'a [Word] {
        self.words
    }

    /// Decode every record in order, without executing anything
    pub fn records(&self) -> Records<'a> {
        Records {
            words: self.words,
            offset: 0,
            index: 0,
            count: self.count,
        }
    }

    /// Total number of kernel calls a replay issues
    pub fn total_calls(&self) -> Result<usize, ReplayError> {
        self.records()
            .try_fold(0usize, |acc, record| -> Result<usize, ReplayError> {
                Ok(acc + record?.iterations())
            })
    }
}

/// Iterator over the records of an [`InvocationStream`]
pub struct Records<'a> {
    words: &'a [Word],
    offset: usize,
    index: usize,
    count: usize,
}

impl<'a> Records<'a> {
    /// Offset of the next record
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<InvocationRecord<'a>, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let item = InvocationRecord::decode(self.words, self.offset, self.index);
        match item {
            Ok((record, next)) => {
                self.offset = next;
                self.index += 1;
                Some(Ok(record))
            }
            Err(err) => {
                // Stop after the first error; nothing past it can be located.
                self.index = self.count;
                Some(Err(err))
            }
        }
    }
}
