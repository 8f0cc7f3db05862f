//! Parameter channel: named values posted from the control side and applied to the
//! generator by the audio side.
//!
//! Messages are `Copy` (names and text values live in a fixed-size inline
//! [`Label`]), so enqueueing, dequeueing and dropping a message never touches the
//! heap. The queue is bounded; when it is full the **oldest** pending message is
//! discarded to make room, so the most recent intent always lands.

use core::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::error::ParamError;
use crate::graph::Generator;

/// Capacity of a [`Label`] in bytes.
pub const LABEL_CAPACITY: usize = 24;

/// Default queue depth for [`channel`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Short inline string used for parameter names and enum-valued parameters.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    bytes: [u8; LABEL_CAPACITY],
    len: u8,
}

impl Label {
    /// Copy `s` into a label. Fails if it does not fit.
    pub fn new(s: &str) -> Result<Self, ParamError> {
        let len = s.len();
        if len > LABEL_CAPACITY {
            return Err(ParamError::LabelTooLong { len, max: LABEL_CAPACITY });
        }
        let mut bytes = [0u8; LABEL_CAPACITY];
        bytes[..len].copy_from_slice(s.as_bytes());
        // len <= 24, fits in u8
        Ok(Self { bytes, len: len as u8 })
    }

    pub fn as_str(&self) -> &str {
        // constructed from a &str and never split, so always valid UTF-8
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    /// Compare against a canonical `snake_case` name, ignoring case, `_` and `-`.
    ///
    /// `upBias`, `up_bias` and `UP-BIAS` all match `"up_bias"`.
    pub fn matches(&self, canonical: &str) -> bool {
        name_matches(self.as_str(), canonical)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// See [`Label::matches`].
pub fn name_matches(name: &str, canonical: &str) -> bool {
    let mut a = name.bytes().filter(|b| *b != b'_' && *b != b'-');
    let mut b = canonical.bytes().filter(|b| *b != b'_' && *b != b'-');
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x.eq_ignore_ascii_case(&y) => continue,
            _ => return false,
        }
    }
}

/// Value carried by a parameter message.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(Label),
}

impl ParamValue {
    pub fn text(s: &str) -> Result<Self, ParamError> {
        Label::new(s).map(Self::Text)
    }

    /// Numeric view. Text that parses as a number counts too.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(l) => l.as_str().trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(l) => Some(l.as_str()),
            Self::Number(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(l) => write!(f, "{l}"),
        }
    }
}

/// Pull a finite number out of `value` for parameter `name`.
pub(crate) fn expect_number(name: &str, value: ParamValue) -> Result<f64, ParamError> {
    let label = || Label::new(name).unwrap_or(EMPTY);
    let v = value
        .as_number()
        .ok_or_else(|| ParamError::WrongType { name: label(), expected: "a number" })?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ParamError::NotFinite(label()))
    }
}

/// Pull a name out of `value` for an enum-valued parameter `name`.
pub(crate) fn expect_text(name: &str, value: ParamValue) -> Result<Label, ParamError> {
    match value {
        ParamValue::Text(l) => Ok(l),
        ParamValue::Number(_) => Err(ParamError::WrongType {
            name: Label::new(name).unwrap_or(EMPTY),
            expected: "a name",
        }),
    }
}

/// Error for a name no variant recognizes.
pub(crate) fn unknown(name: &str) -> ParamError {
    match Label::new(name) {
        Ok(l) => ParamError::Unknown(l),
        Err(e) => e,
    }
}

const EMPTY: Label = Label { bytes: [0; LABEL_CAPACITY], len: 0 };

/// One parameter mutation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParamMessage {
    pub name: Label,
    pub value: ParamValue,
}

impl ParamMessage {
    pub fn new(name: &str, value: ParamValue) -> Result<Self, ParamError> {
        Ok(Self { name: Label::new(name)?, value })
    }

    pub fn number(name: &str, value: f64) -> Result<Self, ParamError> {
        Self::new(name, ParamValue::Number(value))
    }

    pub fn text(name: &str, value: &str) -> Result<Self, ParamError> {
        Self::new(name, ParamValue::text(value)?)
    }

    /// Apply to a generator.
    pub fn apply<G: Generator + ?Sized>(&self, gen: &mut G) -> Result<(), ParamError> {
        gen.set_param(self.name.as_str(), self.value)
    }
}

/// Text form: `name=value`. Values that parse as `f64` become numbers, anything
/// else is kept as text.
impl FromStr for ParamMessage {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s.split_once('=').unwrap_or((s, ""));
        let (name, value) = (name.trim(), value.trim());
        match value.parse::<f64>() {
            Ok(v) => Self::number(name, v),
            Err(_) => Self::text(name, value),
        }
    }
}

/// Create a bounded drop-oldest parameter queue.
pub fn channel(capacity: usize) -> (ParamSender, ParamReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ParamSender { tx, spill: rx.clone(), dropped },
        ParamReceiver { rx },
    )
}

/// Control-side end of the parameter queue.
#[derive(Clone)]
pub struct ParamSender {
    tx: Sender<ParamMessage>,
    // second receiver on the same queue, used only to evict the oldest entry
    spill: Receiver<ParamMessage>,
    dropped: Arc<AtomicU64>,
}

impl ParamSender {
    /// Enqueue a message, evicting the oldest pending one if the queue is full.
    pub fn send(&self, msg: ParamMessage) -> Result<(), ParamError> {
        let mut msg = msg;
        for _ in 0..4 {
            match self.tx.try_send(msg) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(ParamError::Disconnected),
                Err(TrySendError::Full(back)) => {
                    msg = back;
                    if self.spill.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
        // lost every race against other senders; give up on this one
        self.dropped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Convenience: `send(ParamMessage::new(name, value))`.
    pub fn set(&self, name: &str, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        self.send(ParamMessage::new(name, value.into())?)
    }

    /// Convenience for enum-valued parameters.
    pub fn set_text(&self, name: &str, value: &str) -> Result<(), ParamError> {
        self.send(ParamMessage::text(name, value)?)
    }

    /// Messages discarded so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Messages currently waiting.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Audio-side end of the parameter queue.
pub struct ParamReceiver {
    rx: Receiver<ParamMessage>,
}

/// Outcome of [`ParamReceiver::drain_into`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: u32,
    pub rejected: u32,
}

impl ParamReceiver {
    /// Next pending message, if any. Never blocks.
    pub fn try_recv(&self) -> Option<ParamMessage> {
        match self.rx.try_recv() {
            Ok(m) => Some(m),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Apply every pending message to `gen`, in order.
    pub fn drain_into<G: Generator + ?Sized>(&self, gen: &mut G) -> DrainStats {
        let mut stats = DrainStats::default();
        while let Some(msg) = self.try_recv() {
            match msg.apply(gen) {
                Ok(()) => stats.applied += 1,
                Err(_) => stats.rejected += 1,
            }
        }
        stats
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
