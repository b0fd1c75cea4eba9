//! Scalar track compressor.
//!
//! Each track is range-reduced and quantized to the smallest bit rate that keeps every
//! reconstructed sample within the track's precision. The output is a self-describing
//! buffer that can be sampled at any index without unpacking the rest.
//!
//! # Format
//!
//! All integers are little-endian.
//!
//! ```text
//! Header (32 bytes):
//!   Size: u32          total buffer size, padding included
//!   Hash: u32          FNV-1a of bytes [8, size)
//!   Tag: u32           "SCTK"
//!   Version: u16
//!   Flags: u16         reserved
//!   Track count: u32
//!   Sample count: u32  per track
//!   Sample rate: f32
//!   Reserved: 4 bytes
//!
//! Track descriptors (track count * 20 bytes):
//!   Output index: u32
//!   Bit rate: u8       0 = constant, 1..=24 quantized, 32 = raw f32
//!   Padding: 3 bytes
//!   Bit offset: u32    into the bitstream
//!   Range min: f32
//!   Range extent: f32
//!
//! Bitstream (variable):
//!   Samples packed MSB-first, zero padded to a 16 byte boundary
//! ```

use std::collections::HashSet;

use super::Track;
use crate::schema::CompressionSettings;

/// Tag identifying a compressed track buffer ("SCTK").
pub const TRACKS_TAG: u32 = u32::from_le_bytes(*b"SCTK");

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Bit rate of a track holding a single value.
pub const CONSTANT_BIT_RATE: u8 = 0;

/// Highest quantized bit rate; anything needing more is stored raw.
pub const MAX_QUANTIZED_BIT_RATE: u8 = 24;

/// Bit rate of a track stored as raw f32 bits.
pub const RAW_BIT_RATE: u8 = 32;

/// Compressed buffers are padded to this many bytes.
pub const BUFFER_ALIGNMENT: usize = 16;

/// Header fields of a compressed track buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracksHeader {
    pub size: u32,
    pub hash: u32,
    pub version: u16,
    pub flags: u16,
    pub num_tracks: u32,
    pub num_samples: u32,
    pub sample_rate: f32,
}

impl TracksHeader {
    /// Size of header in bytes.
    /// Size(4) + Hash(4) + Tag(4) + Version(2) + Flags(2) + Tracks(4) + Samples(4) +
    /// SampleRate(4) + Reserved(4) = 32
    pub const SIZE: usize = 32;

    /// Write header to output.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.hash.to_le_bytes());
        out.extend_from_slice(&TRACKS_TAG.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.num_tracks.to_le_bytes());
        out.extend_from_slice(&self.num_samples.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        // Reserved bytes
        out.extend_from_slice(&[0u8; 4]);
    }

    /// Read header from the start of `bytes`.
    pub fn read_from(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < Self::SIZE {
            return Err(FormatError::TooSmall { len: bytes.len() });
        }

        let tag = read_u32(bytes, 8);
        if tag != TRACKS_TAG {
            return Err(FormatError::BadTag(tag));
        }

        let version = read_u16(bytes, 12);
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        Ok(Self {
            size: read_u32(bytes, 0),
            hash: read_u32(bytes, 4),
            version,
            flags: read_u16(bytes, 14),
            num_tracks: read_u32(bytes, 16),
            num_samples: read_u32(bytes, 20),
            sample_rate: f32::from_le_bytes(read_array(bytes, 24)),
        })
    }
}

/// Encoding chosen for one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackDescriptor {
    pub output_index: u32,
    pub bit_rate: u8,
    pub bit_offset: u32,
    pub range_min: f32,
    pub range_extent: f32,
}

impl TrackDescriptor {
    /// Size of one descriptor in bytes.
    pub const SIZE: usize = 20;

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.output_index.to_le_bytes());
        out.push(self.bit_rate);
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&self.bit_offset.to_le_bytes());
        out.extend_from_slice(&self.range_min.to_le_bytes());
        out.extend_from_slice(&self.range_extent.to_le_bytes());
    }

    pub fn read_from(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            output_index: read_u32(bytes, 0),
            bit_rate: bytes[4],
            bit_offset: read_u32(bytes, 8),
            range_min: f32::from_le_bytes(read_array(bytes, 12)),
            range_extent: f32::from_le_bytes(read_array(bytes, 16)),
        }
    }

    fn is_valid_bit_rate(&self) -> bool {
        self.bit_rate <= MAX_QUANTIZED_BIT_RATE || self.bit_rate == RAW_BIT_RATE
    }

    /// Bits used by one sample of this track.
    fn sample_bits(&self) -> usize {
        self.bit_rate as usize
    }
}

/// Errors raised while compressing a track list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompressionError {
    #[error("No tracks to compress")]
    NoTracks,
    #[error("Tracks have no samples")]
    NoSamples,
    #[error("Track {track} has {found} samples, expected {expected}")]
    SampleCountMismatch {
        track: usize,
        expected: usize,
        found: usize,
    },
    #[error("Track {track} has sample rate {found}, expected {expected}")]
    SampleRateMismatch {
        track: usize,
        expected: f32,
        found: f32,
    },
    #[error("Track {track} has invalid sample rate {rate}")]
    InvalidSampleRate { track: usize, rate: f32 },
    #[error("Track {track} has invalid precision {precision}")]
    InvalidPrecision { track: usize, precision: f32 },
    #[error("Track {track} sample {sample} is not finite ({value})")]
    NonFiniteSample {
        track: usize,
        sample: usize,
        value: f32,
    },
    #[error("Output index {output_index} of track {track} is already in use")]
    DuplicateOutputIndex { track: usize, output_index: u32 },
    #[error("Compressed size of {0} bytes exceeds the format limit")]
    TooLarge(usize),
}

impl CompressionError {
    /// Index of the track that caused the failure, if any.
    pub fn track(&self) -> Option<usize> {
        match *self {
            CompressionError::SampleCountMismatch { track, .. }
            | CompressionError::SampleRateMismatch { track, .. }
            | CompressionError::InvalidSampleRate { track, .. }
            | CompressionError::InvalidPrecision { track, .. }
            | CompressionError::NonFiniteSample { track, .. }
            | CompressionError::DuplicateOutputIndex { track, .. } => Some(track),
            CompressionError::NoTracks
            | CompressionError::NoSamples
            | CompressionError::TooLarge(_) => None,
        }
    }
}

/// Errors raised while reading a compressed track buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Buffer of {len} bytes is smaller than the header")]
    TooSmall { len: usize },
    #[error("Invalid compressed tracks tag {0:#010x}")]
    BadTag(u32),
    #[error("Unsupported compressed tracks version: {0}")]
    UnsupportedVersion(u16),
    #[error("Declared size {size} does not fit in a buffer of {len} bytes")]
    SizeOutOfRange { size: usize, len: usize },
    #[error("Descriptors for {num_tracks} tracks overrun a buffer of {size} bytes")]
    TruncatedDescriptors { num_tracks: usize, size: usize },
    #[error("Hash mismatch: header says {expected:#010x}, contents hash to {found:#010x}")]
    HashMismatch { expected: u32, found: u32 },
    #[error("Track {0} has a corrupt descriptor")]
    CorruptDescriptor(usize),
}

/// Owned output of [`compress_track_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedTracks {
    bytes: Vec<u8>,
}

impl CompressedTracks {
    /// Total size in bytes, padding included.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Release the buffer to the caller.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Borrow the buffer for sampling.
    pub fn view(&self) -> Result<TracksView<'_>, FormatError> {
        TracksView::parse(&self.bytes)
    }
}

/// Borrowed, parsed view over a compressed track buffer.
///
/// Views never mutate the buffer and can be shared freely between threads.
#[derive(Debug, Clone, Copy)]
pub struct TracksView<'a> {
    header: TracksHeader,
    /// Buffer trimmed to the declared size.
    bytes: &'a [u8],
    descriptors: &'a [u8],
    bitstream: &'a [u8],
}

impl<'a> TracksView<'a> {
    /// Parse the header and locate descriptors and bitstream.
    ///
    /// Trailing bytes after the declared size are ignored. The hash is not checked here;
    /// see [`TracksView::is_valid`].
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FormatError> {
        let header = TracksHeader::read_from(bytes)?;

        let size = header.size as usize;
        if size < TracksHeader::SIZE || size > bytes.len() {
            return Err(FormatError::SizeOutOfRange {
                size,
                len: bytes.len(),
            });
        }
        let bytes = &bytes[..size];

        let num_tracks = header.num_tracks as usize;
        let descriptors_end = num_tracks
            .checked_mul(TrackDescriptor::SIZE)
            .and_then(|n| n.checked_add(TracksHeader::SIZE))
            .filter(|&end| end <= size)
            .ok_or(FormatError::TruncatedDescriptors { num_tracks, size })?;

        Ok(Self {
            header,
            bytes,
            descriptors: &bytes[TracksHeader::SIZE..descriptors_end],
            bitstream: &bytes[descriptors_end..],
        })
    }

    /// Structural self-check: hash (optional), descriptor bit rates and bitstream bounds.
    pub fn is_valid(&self, check_hash: bool) -> Result<(), FormatError> {
        if check_hash {
            let found = fnv1a(&self.bytes[8..]);
            if found != self.header.hash {
                return Err(FormatError::HashMismatch {
                    expected: self.header.hash,
                    found,
                });
            }
        }

        let available_bits = self.bitstream.len() * 8;
        let num_samples = self.header.num_samples as usize;
        for track in 0..self.num_tracks() {
            let desc = self
                .descriptor(track)
                .ok_or(FormatError::CorruptDescriptor(track))?;
            if !desc.is_valid_bit_rate() {
                return Err(FormatError::CorruptDescriptor(track));
            }
            let end = desc
                .sample_bits()
                .checked_mul(num_samples)
                .and_then(|bits| bits.checked_add(desc.bit_offset as usize));
            if !matches!(end, Some(end) if end <= available_bits) {
                return Err(FormatError::CorruptDescriptor(track));
            }
        }
        Ok(())
    }

    pub fn header(&self) -> &TracksHeader {
        &self.header
    }

    /// Declared buffer size in bytes.
    pub fn size(&self) -> usize {
        self.header.size as usize
    }

    pub fn num_tracks(&self) -> usize {
        self.header.num_tracks as usize
    }

    pub fn num_samples(&self) -> usize {
        self.header.num_samples as usize
    }

    pub fn sample_rate(&self) -> f32 {
        self.header.sample_rate
    }

    /// Duration in seconds covered by the samples.
    pub fn duration(&self) -> f32 {
        if self.header.num_samples <= 1 {
            0.0
        } else {
            (self.header.num_samples - 1) as f32 / self.header.sample_rate
        }
    }

    /// Descriptor of `track`, or `None` when out of range.
    pub fn descriptor(&self, track: usize) -> Option<TrackDescriptor> {
        let start = track.checked_mul(TrackDescriptor::SIZE)?;
        let end = start.checked_add(TrackDescriptor::SIZE)?;
        let bytes: &[u8; TrackDescriptor::SIZE] =
            self.descriptors.get(start..end)?.try_into().ok()?;
        Some(TrackDescriptor::read_from(bytes))
    }

    /// Descriptors of every track, in track order.
    pub fn descriptors(&self) -> impl Iterator<Item = TrackDescriptor> + 'a {
        self.descriptors
            .chunks_exact(TrackDescriptor::SIZE)
            .filter_map(|chunk| <&[u8; TrackDescriptor::SIZE]>::try_from(chunk).ok())
            .map(TrackDescriptor::read_from)
    }

    /// Reconstructed value of one sample, or `None` when `track` is out of range or its
    /// descriptor is corrupt.
    #[inline]
    pub fn sample(&self, track: usize, sample: usize) -> Option<f32> {
        let desc = self.descriptor(track).filter(TrackDescriptor::is_valid_bit_rate)?;
        Some(self.sample_with(&desc, sample))
    }

    #[inline]
    pub(crate) fn sample_with(&self, desc: &TrackDescriptor, sample: usize) -> f32 {
        match desc.bit_rate {
            CONSTANT_BIT_RATE => desc.range_min,
            RAW_BIT_RATE => {
                let offset = desc.bit_offset as usize + sample * 32;
                f32::from_bits(read_bits(self.bitstream, offset, RAW_BIT_RATE))
            }
            bit_rate @ 1..=MAX_QUANTIZED_BIT_RATE => {
                let offset = desc.bit_offset as usize + sample * bit_rate as usize;
                let q = read_bits(self.bitstream, offset, bit_rate);
                dequantize(q, desc.range_min, desc.range_extent, max_quantized(bit_rate))
            }
            // Corrupt descriptor, rejected by `is_valid`.
            _ => 0.0,
        }
    }
}

/// Compress every track into a single buffer.
///
/// Tracks are compressed jointly: they must share sample count and sample rate, and each
/// must use a distinct output index.
pub fn compress_track_list(
    tracks: &[Track],
    settings: &CompressionSettings,
) -> Result<CompressedTracks, CompressionError> {
    let (num_samples, sample_rate) = validate_tracks(tracks)?;

    let mut writer = BitWriter::default();
    let mut descriptors = Vec::with_capacity(tracks.len());

    for track in tracks {
        let encoding = select_encoding(&track.samples, track.precision, settings);
        let bit_offset = u32::try_from(writer.bit_len())
            .map_err(|_| CompressionError::TooLarge(writer.bit_len() / 8))?;

        match encoding.bit_rate {
            CONSTANT_BIT_RATE => {}
            RAW_BIT_RATE => {
                for &v in &track.samples {
                    writer.write(v.to_bits(), RAW_BIT_RATE);
                }
            }
            bit_rate => {
                let max_q = max_quantized(bit_rate);
                for &v in &track.samples {
                    writer.write(
                        quantize(v, encoding.min, encoding.extent, max_q),
                        bit_rate,
                    );
                }
            }
        }

        descriptors.push(TrackDescriptor {
            output_index: track.output_index,
            bit_rate: encoding.bit_rate,
            bit_offset,
            range_min: encoding.min,
            range_extent: encoding.extent,
        });
    }

    let bitstream = writer.into_bytes();
    let unpadded = TracksHeader::SIZE + descriptors.len() * TrackDescriptor::SIZE + bitstream.len();
    let size = unpadded.next_multiple_of(BUFFER_ALIGNMENT);
    let size_u32 = u32::try_from(size).map_err(|_| CompressionError::TooLarge(size))?;

    let mut bytes = Vec::with_capacity(size);
    TracksHeader {
        size: size_u32,
        hash: 0,
        version: FORMAT_VERSION,
        flags: 0,
        num_tracks: tracks.len() as u32,
        num_samples: num_samples as u32,
        sample_rate,
    }
    .write_to(&mut bytes);
    for desc in &descriptors {
        desc.write_to(&mut bytes);
    }
    bytes.extend_from_slice(&bitstream);
    bytes.resize(size, 0);

    let hash = fnv1a(&bytes[8..]);
    bytes[4..8].copy_from_slice(&hash.to_le_bytes());

    Ok(CompressedTracks { bytes })
}

/// Check the invariants the compressor relies on; returns (sample count, sample rate).
fn validate_tracks(tracks: &[Track]) -> Result<(usize, f32), CompressionError> {
    let first = tracks.first().ok_or(CompressionError::NoTracks)?;
    let num_samples = first.samples.len();
    if num_samples == 0 {
        return Err(CompressionError::NoSamples);
    }
    if u32::try_from(num_samples).is_err() || u32::try_from(tracks.len()).is_err() {
        return Err(CompressionError::TooLarge(num_samples.saturating_mul(tracks.len())));
    }
    let sample_rate = first.sample_rate;

    let mut output_indices = HashSet::with_capacity(tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        if track.samples.len() != num_samples {
            return Err(CompressionError::SampleCountMismatch {
                track: i,
                expected: num_samples,
                found: track.samples.len(),
            });
        }
        if !(track.sample_rate.is_finite() && track.sample_rate > 0.0) {
            return Err(CompressionError::InvalidSampleRate {
                track: i,
                rate: track.sample_rate,
            });
        }
        if track.sample_rate != sample_rate {
            return Err(CompressionError::SampleRateMismatch {
                track: i,
                expected: sample_rate,
                found: track.sample_rate,
            });
        }
        if !(track.precision.is_finite() && track.precision > 0.0) {
            return Err(CompressionError::InvalidPrecision {
                track: i,
                precision: track.precision,
            });
        }
        if let Some(sample) = track.samples.iter().position(|v| !v.is_finite()) {
            return Err(CompressionError::NonFiniteSample {
                track: i,
                sample,
                value: track.samples[sample],
            });
        }
        if !output_indices.insert(track.output_index) {
            return Err(CompressionError::DuplicateOutputIndex {
                track: i,
                output_index: track.output_index,
            });
        }
    }

    Ok((num_samples, sample_rate))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Encoding {
    bit_rate: u8,
    min: f32,
    extent: f32,
}

/// Pick the cheapest encoding whose reconstruction error stays within `precision`.
fn select_encoding(samples: &[f32], precision: f32, settings: &CompressionSettings) -> Encoding {
    let (min, max) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let extent = max - min;

    let raw = Encoding {
        bit_rate: RAW_BIT_RATE,
        min: 0.0,
        extent: 0.0,
    };
    if !extent.is_finite() {
        return raw;
    }

    if extent * 0.5 <= precision {
        let mid = min + extent * 0.5;
        if !settings.verify_error || samples.iter().all(|&v| (mid - v).abs() <= precision) {
            return Encoding {
                bit_rate: CONSTANT_BIT_RATE,
                min: mid,
                extent: 0.0,
            };
        }
    }

    for &bit_rate in settings.level.bit_rate_candidates() {
        let max_q = max_quantized(bit_rate);
        let fits = if settings.verify_error {
            samples.iter().all(|&v| {
                let q = quantize(v, min, extent, max_q);
                (dequantize(q, min, extent, max_q) - v).abs() <= precision
            })
        } else {
            extent / (2.0 * max_q as f32) <= precision
        };
        if fits {
            return Encoding {
                bit_rate,
                min,
                extent,
            };
        }
    }

    raw
}

#[inline]
fn max_quantized(bit_rate: u8) -> u32 {
    (1u32 << bit_rate) - 1
}

#[inline]
fn quantize(value: f32, min: f32, extent: f32, max_q: u32) -> u32 {
    if extent <= 0.0 {
        return 0;
    }
    let normalized = ((value - min) / extent).clamp(0.0, 1.0);
    (normalized * max_q as f32).round() as u32
}

#[inline]
fn dequantize(q: u32, min: f32, extent: f32, max_q: u32) -> f32 {
    min + (q as f32 / max_q as f32) * extent
}

/// MSB-first bit packer.
#[derive(Debug, Default)]
struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    fn write(&mut self, value: u32, num_bits: u8) {
        for bit in (0..num_bits).rev() {
            let byte = self.bit_len / 8;
            if byte == self.bytes.len() {
                self.bytes.push(0);
            }
            if (value >> bit) & 1 != 0 {
                self.bytes[byte] |= 0x80 >> (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }

    fn bit_len(&self) -> usize {
        self.bit_len
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Read `num_bits` (at most 32) MSB-first bits starting at `bit_offset`.
#[inline]
fn read_bits(stream: &[u8], bit_offset: usize, num_bits: u8) -> u32 {
    if num_bits == 0 {
        return 0;
    }
    let start = bit_offset / 8;
    let mut word = 0u64;
    for i in 0..8 {
        word = (word << 8) | stream.get(start + i).copied().unwrap_or(0) as u64;
    }
    let word = word << (bit_offset % 8);
    (word >> (64 - num_bits as u32)) as u32
}

/// 32-bit FNV-1a hash.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5u32, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(0x0100_0193)
    })
}

#[inline]
fn read_array(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(read_array(bytes, offset))
}

#[inline]
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}
