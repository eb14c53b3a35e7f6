//! Invocation stream encoder
//!
//! Host-side counterpart of [`crate::stream`]: produces the exact word
//! layout the replay engine decodes. Used by tests, benchmarks and the
//! system image tooling.

use crate::error::{CapacityError, EncodeError};
use crate::stream::InvocationStream;
use crate::BOOTSTRAP_INVOCATION_WORDS;
use alloc::vec::Vec;
use sel4_platform::types::{MAX_EXTRA_CAPS, MSG_MAX_LENGTH};
use sel4_platform::{CPtr, InvocationLabel, MessageInfo, Word};

/// Largest label that still fits in the low 32 bits of a tag word
const MAX_STREAM_LABEL: Word = (1 << 20) - 1;

/// Per-iteration increments of a repeated invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Increments {
    pub service: Word,
    pub caps: Vec<Word>,
    pub mrs: Vec<Word>,
}

/// One invocation to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    label: Word,
    service: CPtr,
    caps: Vec<CPtr>,
    mrs: Vec<Word>,
    repeat: Option<(usize, Increments)>,
}

impl Invocation {
    pub fn new(label: InvocationLabel, service: CPtr) -> Self {
        Self::with_raw_label(label.into_word(), service)
    }

    /// Invocation with a label the [`InvocationLabel`] table does not name
    pub fn with_raw_label(label: Word, service: CPtr) -> Self {
        Self {
            label,
            service,
            caps: Vec::new(),
            mrs: Vec::new(),
            repeat: None,
        }
    }

    pub fn caps(mut self, caps: &[CPtr]) -> Self {
        self.caps = caps.to_vec();
        self
    }

    pub fn mrs(mut self, mrs: &[Word]) -> Self {
        self.mrs = mrs.to_vec();
        self
    }

    /// Issue `count` times, advancing by `increments` each time.
    ///
    /// Missing cap or register increments are zero.
    pub fn repeat(mut self, count: usize, mut increments: Increments) -> Self {
        increments.caps.resize(self.caps.len().max(increments.caps.len()), 0);
        increments.mrs.resize(self.mrs.len().max(increments.mrs.len()), 0);
        self.repeat = Some((count, increments));
        self
    }

    fn encode(&self, out: &mut Vec<Word>) -> Result<(), EncodeError> {
        if self.caps.len() > MAX_EXTRA_CAPS as usize {
            return Err(EncodeError::TooManyCaps {
                count: self.caps.len(),
                max: MAX_EXTRA_CAPS as usize,
            });
        }
        if self.mrs.len() > MSG_MAX_LENGTH {
            return Err(EncodeError::TooManyRegisters {
                count: self.mrs.len(),
                max: MSG_MAX_LENGTH,
            });
        }
        if self.label > MAX_STREAM_LABEL {
            return Err(EncodeError::LabelTooWide(self.label));
        }

        let info = MessageInfo::new(self.label, 0, self.caps.len() as Word, self.mrs.len() as Word);
        let iterations = match &self.repeat {
            Some((count, _)) if *count == 0 || *count as u64 > 1 << 32 => {
                return Err(EncodeError::Iterations(*count))
            }
            Some((count, _)) => *count,
            None => 1,
        };

        out.push(info.into_word() | ((iterations as Word - 1) << 32));
        out.push(self.service);
        out.extend_from_slice(&self.caps);
        out.extend_from_slice(&self.mrs);

        if let Some((count, inc)) = &self.repeat {
            if *count > 1 {
                if inc.caps.len() != self.caps.len() {
                    return Err(EncodeError::StrideShape {
                        expected: self.caps.len(),
                        actual: inc.caps.len(),
                    });
                }
                if inc.mrs.len() != self.mrs.len() {
                    return Err(EncodeError::StrideShape {
                        expected: self.mrs.len(),
                        actual: inc.mrs.len(),
                    });
                }
                out.push(inc.service);
                out.extend_from_slice(&inc.caps);
                out.extend_from_slice(&inc.mrs);
            }
        }
        Ok(())
    }
}

/// Accumulates invocations into a stream
#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    buf: StreamBuf,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one invocation
    pub fn push(&mut self, invocation: Invocation) -> Result<&mut Self, EncodeError> {
        let mark = self.buf.words.len();
        if let Err(err) = invocation.encode(&mut self.buf.words) {
            self.buf.words.truncate(mark);
            return Err(err);
        }
        self.buf.count += 1;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.count
    }

    pub fn is_empty(&self) -> bool {
        self.buf.count == 0
    }

    pub fn finish(self) -> StreamBuf {
        self.buf
    }
}

/// An owned, encoded invocation stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamBuf {
    count: usize,
    words: Vec<Word>,
}

impl StreamBuf {
    pub fn new(count: usize, words: Vec<Word>) -> Self {
        Self { count, words }
    }

    /// Load from a little-endian byte image. A trailing partial word is
    /// ignored.
    pub fn from_le_bytes(count: usize, bytes: &[u8]) -> Self {
        let words = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                Word::from_le_bytes(word)
            })
            .collect();
        Self { count, words }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Borrow as a decodable stream
    pub fn stream(&self) -> InvocationStream<'_> {
        InvocationStream::new(self.count, &self.words)
    }

    /// Copy into the fixed-capacity bootstrap array
    pub fn to_bootstrap(&self) -> Result<BootstrapStream, CapacityError> {
        BootstrapStream::new(self.count, &self.words)
    }
}

/// The bootstrap stream as it sits in the initial image: a fixed array the
/// build tool patches, plus a record count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStream {
    count: usize,
    data: [Word; BOOTSTRAP_INVOCATION_WORDS],
}

impl BootstrapStream {
    /// Fails when `words` does not fit the array; the build tool reports
    /// this before an image is produced.
    pub fn new(count: usize, words: &[Word]) -> Result<Self, CapacityError> {
        if words.len() > BOOTSTRAP_INVOCATION_WORDS {
            return Err(CapacityError {
                needed: words.len(),
                capacity: BOOTSTRAP_INVOCATION_WORDS,
            });
        }
        let mut data = [0; BOOTSTRAP_INVOCATION_WORDS];
        data[..words.len()].copy_from_slice(words);
        Ok(Self { count, data })
    }

    pub fn stream(&self) -> InvocationStream<'_> {
        InvocationStream::new(self.count, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_invocation_layout() {
        let mut builder = StreamBuilder::new();
        builder
            .push(Invocation::new(InvocationLabel::TcbResume, 10))
            .unwrap();
        let buf = builder.finish();
        let info = MessageInfo::new(InvocationLabel::TcbResume.into_word(), 0, 0, 0);
        assert_eq!(buf.words(), &[info.into_word(), 10]);
    }

    #[test]
    fn test_repeated_invocation_layout() {
        let mut builder = StreamBuilder::new();
        builder
            .push(
                Invocation::new(InvocationLabel::TcbResume, 10)
                    .caps(&[20])
                    .mrs(&[1, 2])
                    .repeat(
                        4,
                        Increments {
                            service: 1,
                            caps: vec![1],
                            mrs: vec![0, 8],
                        },
                    ),
            )
            .unwrap();
        let buf = builder.finish();
        let words = buf.words();
        assert_eq!(words[0] >> 32, 3);
        assert_eq!(&words[1..], &[10, 20, 1, 2, 1, 1, 0, 8]);
    }

    #[test]
    fn test_rejected_invocation_leaves_stream_untouched() {
        let mut builder = StreamBuilder::new();
        let err = builder
            .push(Invocation::new(InvocationLabel::TcbResume, 1).caps(&[1, 2, 3, 4]))
            .unwrap_err();
        assert_eq!(err, EncodeError::TooManyCaps { count: 4, max: 3 });
        assert!(builder.is_empty());
        assert!(builder.finish().words().is_empty());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut builder = StreamBuilder::new();
        let err = builder
            .push(Invocation::new(InvocationLabel::TcbResume, 1).repeat(0, Increments::default()))
            .unwrap_err();
        assert_eq!(err, EncodeError::Iterations(0));
    }

    #[test]
    fn test_bootstrap_capacity() {
        let words = [0; BOOTSTRAP_INVOCATION_WORDS + 1];
        let err = BootstrapStream::new(1, &words).unwrap_err();
        assert_eq!(err.capacity, BOOTSTRAP_INVOCATION_WORDS);
        assert!(BootstrapStream::new(1, &words[..BOOTSTRAP_INVOCATION_WORDS]).is_ok());
    }

    #[test]
    fn test_byte_image_round_trip() {
        let buf = StreamBuf::new(1, vec![0x0102_0304_0506_0708, 5]);
        let bytes = buf.to_le_bytes();
        assert_eq!(bytes[0], 0x08);
        assert_eq!(StreamBuf::from_le_bytes(1, &bytes), buf);
    }
}
