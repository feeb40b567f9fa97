// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Call-scoped scratch and pin buffers.
//!
//! One `ScratchFrame` serves one write call. Scalars are copied into a
//! scratch region sized exactly from the descriptor set; variable-length
//! data is pinned, i.e. borrowed for the lifetime `'a` of the payload, and
//! handed to the native writer as its own segment.
//!
//! Sessions are opened through [`ScratchFrame::session`], whose guard runs
//! [`ScratchFrame::disable`] on drop. Every exit path of a write (success,
//! encode error, native error, panic unwinding) therefore releases all pins.
//!
//! ```text
//! scratch: [ u32 id | u16 len(name) | f64 ratio ]
//! pins:    [ &name ]
//! slots:   Scalar(0..4) Length(4..6) Pin(0) Scalar(6..14)
//! ```

use crate::error::EncodeError;
use crate::sink::{Segment, SegmentKind};
use std::borrow::Cow;
use std::ops::{Deref, DerefMut, Range};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Live pin counter shared by every frame of an event source.
#[derive(Debug, Default)]
pub struct PinLedger {
    live: AtomicUsize,
}

impl PinLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins currently held by open sessions.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn acquire(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self, count: usize) {
        self.live.fetch_sub(count, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Scalar(Range<usize>),
    Length(Range<usize>),
    Pin(usize),
}

/// Scratch region plus pin table for a single write.
#[derive(Debug)]
pub struct ScratchFrame<'a> {
    scratch: Box<[u8]>,
    used: usize,
    slots: Vec<Slot>,
    pins: Vec<Cow<'a, [u8]>>,
    pin_capacity: usize,
    active: bool,
    ledger: Option<&'a PinLedger>,
}

impl<'a> ScratchFrame<'a> {
    pub fn new() -> Self {
        Self {
            scratch: Box::default(),
            used: 0,
            slots: Vec::new(),
            pins: Vec::new(),
            pin_capacity: 0,
            active: false,
            ledger: None,
        }
    }

    /// Frame whose pins are accounted in `ledger`.
    pub fn with_ledger(ledger: &'a PinLedger) -> Self {
        Self {
            ledger: Some(ledger),
            ..Self::new()
        }
    }

    /// Open a write session sized for exactly `scratch_size` bytes,
    /// `slot_count` segments and `pin_count` pins.
    ///
    /// # Panics
    ///
    /// Panics if a session is already open on this frame. Nested writes
    /// (e.g. from a listener callback) must use their own frame.
    pub fn enable(&mut self, scratch_size: usize, slot_count: usize, pin_count: usize) {
        assert!(
            !self.active,
            "write frame enabled twice: nested writes need a fresh frame"
        );
        self.scratch = vec![0u8; scratch_size].into_boxed_slice();
        self.used = 0;
        self.slots = Vec::with_capacity(slot_count);
        self.pins = Vec::with_capacity(pin_count);
        self.pin_capacity = pin_count;
        self.active = true;
    }

    /// Open a session released automatically when the guard drops.
    pub fn session(
        &mut self,
        scratch_size: usize,
        slot_count: usize,
        pin_count: usize,
    ) -> FrameSession<'_, 'a> {
        self.enable(scratch_size, slot_count, pin_count);
        FrameSession { frame: self }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn reserve(&mut self, len: usize) -> Result<Range<usize>, EncodeError> {
        debug_assert!(self.active, "write on a disabled frame");
        let start = self.used;
        let end = start + len;
        if end > self.scratch.len() {
            return Err(EncodeError::ScratchOverflow {
                offset: start,
                needed: len,
                capacity: self.scratch.len(),
            });
        }
        self.used = end;
        Ok(start..end)
    }

    /// Copy an encoded scalar into the next scratch slot.
    pub fn write_scalar(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let range = self.reserve(bytes.len())?;
        self.scratch[range.clone()].copy_from_slice(bytes);
        self.slots.push(Slot::Scalar(range));
        Ok(())
    }

    /// Write the u16 length segment preceding a pinned segment.
    pub fn write_length(&mut self, len: u16) -> Result<(), EncodeError> {
        let range = self.reserve(2)?;
        self.scratch[range.clone()].copy_from_slice(&len.to_le_bytes());
        self.slots.push(Slot::Length(range));
        Ok(())
    }

    /// Pin variable-length data for the duration of the session.
    pub fn pin(&mut self, data: Cow<'a, [u8]>) -> Result<(), EncodeError> {
        debug_assert!(self.active, "pin on a disabled frame");
        if self.pins.len() >= self.pin_capacity {
            return Err(EncodeError::PinOverflow {
                capacity: self.pin_capacity,
            });
        }
        self.slots.push(Slot::Pin(self.pins.len()));
        self.pins.push(data);
        if let Some(ledger) = self.ledger {
            ledger.acquire();
        }
        Ok(())
    }

    /// Pins held by the open session.
    pub fn pinned(&self) -> usize {
        self.pins.len()
    }

    /// Scratch bytes written so far.
    pub fn scratch_used(&self) -> usize {
        self.used
    }

    /// Number of payload segments produced.
    pub fn finish(&self) -> usize {
        self.slots.len()
    }

    /// Append the payload segments, in write order, to `out`.
    pub fn append_segments<'s>(&'s self, out: &mut Vec<Segment<'s>>) {
        for slot in &self.slots {
            let segment = match slot {
                Slot::Scalar(r) => Segment::new(SegmentKind::Scalar, &self.scratch[r.clone()]),
                Slot::Length(r) => Segment::new(SegmentKind::Length, &self.scratch[r.clone()]),
                Slot::Pin(i) => Segment::new(SegmentKind::Pinned, self.pins[*i].as_ref()),
            };
            out.push(segment);
        }
    }

    /// Close the session and release every pin. Idempotent.
    pub fn disable(&mut self) {
        if !self.active {
            return;
        }
        let released = self.pins.len();
        self.pins.clear();
        self.slots.clear();
        if let Some(ledger) = self.ledger {
            ledger.release(released);
        }
        self.active = false;
    }
}

impl Default for ScratchFrame<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Open session on a [`ScratchFrame`]; disables the frame on drop.
pub struct FrameSession<'f, 'a> {
    frame: &'f mut ScratchFrame<'a>,
}

impl<'a> Deref for FrameSession<'_, 'a> {
    type Target = ScratchFrame<'a>;

    fn deref(&self) -> &Self::Target {
        self.frame
    }
}

impl DerefMut for FrameSession<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame
    }
}

impl Drop for FrameSession<'_, '_> {
    fn drop(&mut self) {
        self.frame.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_and_pins_in_order() {
        let name = String::from("alpha");
        let mut frame = ScratchFrame::new();
        let mut session = frame.session(8, 4, 1);

        session.write_scalar(&7u32.to_le_bytes()).expect("scalar fits");
        session.write_length(name.len() as u16).expect("length fits");
        session.pin(Cow::Borrowed(name.as_bytes())).expect("pin fits");
        session.write_scalar(&[1, 0]).expect("scalar fits");

        assert_eq!(session.finish(), 4);
        assert_eq!(session.scratch_used(), 8);

        let mut segments = Vec::new();
        session.append_segments(&mut segments);
        let kinds: Vec<_> = segments.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Scalar,
                SegmentKind::Length,
                SegmentKind::Pinned,
                SegmentKind::Scalar
            ]
        );
        assert_eq!(segments[0].data, &[7, 0, 0, 0]);
        assert_eq!(segments[1].data, &[5, 0]);
        assert_eq!(segments[2].data, b"alpha");
        assert_eq!(segments[2].data.as_ptr(), name.as_ptr());
    }

    #[test]
    fn test_scratch_overflow_is_reported() {
        let mut frame = ScratchFrame::new();
        let mut session = frame.session(2, 1, 0);
        let err = session.write_scalar(&[0; 4]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::ScratchOverflow {
                offset: 0,
                needed: 4,
                capacity: 2
            }
        );
    }

    #[test]
    fn test_pin_overflow_is_reported() {
        let mut frame = ScratchFrame::new();
        let mut session = frame.session(0, 1, 0);
        let err = session.pin(Cow::Borrowed(b"x")).unwrap_err();
        assert_eq!(err, EncodeError::PinOverflow { capacity: 0 });
    }

    #[test]
    fn test_session_drop_releases_pins() {
        let ledger = PinLedger::new();
        let blob = vec![1u8, 2, 3];
        let mut frame = ScratchFrame::with_ledger(&ledger);
        {
            let mut session = frame.session(0, 2, 2);
            session.pin(Cow::Borrowed(&blob[..])).expect("pin fits");
            session.pin(Cow::Borrowed(&blob[1..])).expect("pin fits");
            assert_eq!(ledger.live(), 2);
        }
        assert_eq!(ledger.live(), 0);
        assert!(!frame.is_active());
        assert_eq!(frame.pinned(), 0);
    }

    #[test]
    fn test_session_drop_on_error_path() {
        fn fill<'a>(frame: &mut ScratchFrame<'a>, data: &'a [u8]) -> Result<(), EncodeError> {
            let mut session = frame.session(2, 3, 1);
            session.write_length(data.len() as u16)?;
            session.pin(Cow::Borrowed(data))?;
            session.write_scalar(&[0; 8])?;
            Ok(())
        }

        let ledger = PinLedger::new();
        let data = b"payload".to_vec();
        let mut frame = ScratchFrame::with_ledger(&ledger);
        assert!(fill(&mut frame, &data).is_err());
        assert_eq!(ledger.live(), 0);
        assert!(!frame.is_active());
    }

    #[test]
    #[should_panic(expected = "enabled twice")]
    fn test_double_enable_panics() {
        let mut frame = ScratchFrame::new();
        frame.enable(4, 1, 0);
        frame.enable(4, 1, 0);
    }

    #[test]
    fn test_reenable_after_disable_allocates_fresh() {
        let mut frame = ScratchFrame::new();
        frame.enable(4, 1, 0);
        frame.write_scalar(&[9; 4]).expect("fits");
        frame.disable();
        frame.disable();

        frame.enable(2, 1, 0);
        assert_eq!(frame.scratch_used(), 0);
        assert_eq!(frame.finish(), 0);
    }
}
