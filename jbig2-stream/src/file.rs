//! The incremental file parser (Annex D).
//!
//! Input is pushed into an [`InputBuffer`] in arbitrary chunks and
//! [`FileParser::next`] advances an explicit state as far as the buffered
//! data allows, handing out one segment at a time.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::error::{BufferError, FormatError, ParseError, Result, bail};
use crate::reader::Reader;
use crate::segment::{SegmentHeader, SegmentType, find_unknown_length, parse_header};

/// "0x97 0x4A 0x42 0x32 0x0D 0x0A 0x1A 0x0A" (D.4.1)
const FILE_HEADER_ID: [u8; 8] = [0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];

/// A growable buffer with a read cursor.
#[derive(Debug, Clone)]
pub(crate) struct InputBuffer {
    data: Vec<u8>,
    read: usize,
    limit: usize,
}

impl InputBuffer {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            read: 0,
            limit,
        }
    }

    /// Append `bytes`, first dropping the consumed prefix if it is larger than
    /// what is still unread.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let unread = self.data.len() - self.read;

        if self.read > unread {
            self.data.drain(..self.read);
            self.read = 0;
        }

        if unread.saturating_add(bytes.len()) > self.limit {
            bail!(BufferError::LimitExceeded);
        }

        self.data.extend_from_slice(bytes);

        Ok(())
    }

    pub(crate) fn unread(&self) -> &[u8] {
        &self.data[self.read..]
    }

    /// Consume `len` bytes and return them.
    fn take(&mut self, len: usize) -> &[u8] {
        let start = self.read;
        self.read += len;
        &self.data[start..self.read]
    }
}

/// The fields of the file header (D.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub(crate) sequential: bool,
    /// `None` if the number of pages was not known when the file was written.
    pub(crate) page_count: Option<u32>,
    pub(crate) extended_templates: bool,
    pub(crate) coloured_regions: bool,
}

impl FileHeader {
    /// Parse the file header, `None` if it is not fully buffered.
    fn parse(data: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut reader = Reader::new(data);

        let Some(id) = reader.read_bytes(FILE_HEADER_ID.len()) else {
            // Reject a bad magic as early as possible.
            if !FILE_HEADER_ID.starts_with(data) {
                bail!(FormatError::InvalidHeader);
            }
            return Ok(None);
        };

        if id != FILE_HEADER_ID {
            bail!(FormatError::InvalidHeader);
        }

        let Some(flags) = reader.read_byte() else {
            return Ok(None);
        };

        if flags & 0xF0 != 0 {
            bail!(FormatError::ReservedBits);
        }

        let page_count = if flags & 0x02 != 0 {
            None
        } else {
            let Some(count) = reader.read_u32() else {
                return Ok(None);
            };
            Some(count)
        };

        let header = Self {
            sequential: flags & 0x01 != 0,
            page_count,
            extended_templates: flags & 0x04 != 0,
            coloured_regions: flags & 0x08 != 0,
        };

        Ok(Some((header, reader.offset())))
    }
}

#[derive(Debug, Clone)]
enum FileState {
    FileHeader,
    /// Sequential organisation, expecting a segment header.
    SequentialHeader,
    /// Sequential organisation, expecting the body of the given header.
    SequentialBody(SegmentHeader),
    /// Random-access organisation, collecting segment headers.
    RandomHeaders,
    /// Random-access organisation, handing out bodies in header order.
    RandomBodies,
    Eof,
}

/// What a call to [`FileParser::next`] achieved.
#[derive(Debug)]
pub(crate) enum Event<'a> {
    /// Nothing more can be done with the buffered input.
    NeedMoreInput,
    /// The state advanced without producing a segment.
    Progressed,
    /// The file header was parsed.
    FileHeader(FileHeader),
    /// A complete segment, ready to be decoded.
    Segment(SegmentHeader, &'a [u8]),
    /// The end of file segment was reached.
    Finished,
}

#[derive(Debug, Clone)]
pub(crate) struct FileParser {
    buffer: InputBuffer,
    state: FileState,
    pending: VecDeque<SegmentHeader>,
}

impl FileParser {
    /// `embedded` streams, as found in PDF, have no file header and are always
    /// sequential.
    pub(crate) fn new(embedded: bool, max_buffer_size: usize) -> Self {
        Self {
            buffer: InputBuffer::new(max_buffer_size),
            state: if embedded {
                FileState::SequentialHeader
            } else {
                FileState::FileHeader
            },
            pending: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.push(bytes)
    }

    pub(crate) fn is_finished(&self) -> bool {
        matches!(self.state, FileState::Eof)
    }

    /// Whether input is buffered that has not been turned into a segment.
    pub(crate) fn has_partial_input(&self) -> bool {
        !self.buffer.unread().is_empty()
            || !self.pending.is_empty()
            || matches!(self.state, FileState::SequentialBody(_))
    }

    pub(crate) fn next(&mut self) -> Result<Event<'_>> {
        match core::mem::replace(&mut self.state, FileState::Eof) {
            FileState::FileHeader => {
                let Some((header, len)) = FileHeader::parse(self.buffer.unread())? else {
                    self.state = FileState::FileHeader;
                    return Ok(Event::NeedMoreInput);
                };

                self.buffer.take(len);
                self.state = if header.sequential {
                    FileState::SequentialHeader
                } else {
                    FileState::RandomHeaders
                };

                Ok(Event::FileHeader(header))
            }
            FileState::SequentialHeader => {
                let Some((header, len)) = parse_header(self.buffer.unread())? else {
                    self.state = FileState::SequentialHeader;
                    return Ok(Event::NeedMoreInput);
                };

                self.buffer.take(len);
                self.state = FileState::SequentialBody(header);

                Ok(Event::Progressed)
            }
            FileState::SequentialBody(header) => {
                let Some(len) = body_length(&header, self.buffer.unread())? else {
                    self.state = FileState::SequentialBody(header);
                    return Ok(Event::NeedMoreInput);
                };

                self.state = if header.segment_type == SegmentType::EndOfFile {
                    FileState::Eof
                } else {
                    FileState::SequentialHeader
                };

                Ok(Event::Segment(header, self.buffer.take(len)))
            }
            FileState::RandomHeaders => {
                let Some((header, len)) = parse_header(self.buffer.unread())? else {
                    self.state = FileState::RandomHeaders;
                    return Ok(Event::NeedMoreInput);
                };

                self.buffer.take(len);
                self.state = if header.segment_type == SegmentType::EndOfFile {
                    FileState::RandomBodies
                } else {
                    FileState::RandomHeaders
                };
                self.pending.push_back(header);

                Ok(Event::Progressed)
            }
            FileState::RandomBodies => {
                let Some(header) = self.pending.pop_front() else {
                    return Ok(Event::Finished);
                };

                let Some(len) = body_length(&header, self.buffer.unread())? else {
                    self.pending.push_front(header);
                    self.state = FileState::RandomBodies;
                    return Ok(Event::NeedMoreInput);
                };

                self.state = FileState::RandomBodies;

                Ok(Event::Segment(header, self.buffer.take(len)))
            }
            FileState::Eof => Ok(Event::Finished),
        }
    }
}

/// The length of the body of `header` if `data` holds all of it.
fn body_length(header: &SegmentHeader, data: &[u8]) -> Result<Option<usize>> {
    let len = match header.data_length {
        Some(len) => usize::try_from(len).map_err(|_| ParseError::UnexpectedEof)?,
        None => match find_unknown_length(data) {
            Some(len) => len,
            None => return Ok(None),
        },
    };

    Ok((data.len() >= len).then_some(len))
}
