use thiserror::Error;

/// The closed set of error conditions a core operation can return.
///
/// Grouped by the taxonomy families of the control surface: buffer, argument,
/// trace lifecycle, and parser errors all live in one enum, matching how
/// `HdbError` in the teacher crate carries every fallible outcome of a
/// connection in a single type rather than one type per subsystem.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FluxError {
    // --- Buffer ---
    /// A buffer received a command it does not implement (e.g. `SECCOMMIT` on a linear buffer).
    #[error("buffer does not support this command")]
    UnknownCommand,

    /// A requested byte count exceeds the buffer's total capacity and can never be satisfied.
    #[error("requested size exceeds buffer capacity")]
    Overflow,

    /// The buffer has no bytes available for the requested operation.
    #[error("no bytes available")]
    NotAvail,

    /// A buffer was bound to a trace that already has a buffer bound, or vice versa.
    #[error("buffer is already bound to a trace")]
    AlreadyUsed,

    // --- Argument ---
    /// A supplied value is out of the domain the operation accepts.
    #[error("invalid value")]
    InvalidValue,

    /// A supplied byte size does not match what the operation expects.
    #[error("invalid data size")]
    InvalidDataSize,

    /// An item id is zero, out of range, or otherwise not addressable.
    #[error("invalid item id")]
    InvalidId,

    /// A logic-state pack mode/level combination is not representable.
    #[error("invalid pack mode")]
    InvalidPackMode,

    // --- Trace lifecycle ---
    /// The trace has no buffer bound yet.
    #[error("no buffer bound to trace")]
    NoBuffer,

    /// An open/close call targeted the synthetic root incorrectly, or vice versa.
    #[error("invalid open/close call")]
    InvalidOpenClose,

    /// `itemId` was already given a type by a previous definition.
    #[error("item already defined")]
    ItemAlreadyDefined,

    /// An operation addressed an item slot that has never been defined.
    #[error("item not defined")]
    ItemNotDefined,

    /// `parentId` does not name a defined scope.
    #[error("parent not defined")]
    ParentNotDefined,

    /// The item, or an ancestor of it, is already open.
    #[error("item or ancestor is already open")]
    AlreadyOpen,

    /// A descendant of the item is already open.
    #[error("children already open")]
    ChildrenAlreadyOpen,

    /// A write or close was attempted on an item that is not open.
    #[error("item is not open")]
    NotOpen,

    /// A write's domain position precedes the item's current position.
    #[error("domain position is less than current")]
    PositionLessThanCurrent,

    // --- Parser ---
    /// The inbound byte stream could not be read.
    #[error("read error")]
    ReadError,

    /// A control entry's framing is malformed.
    #[error("control message parse error")]
    CommandParseError,

    /// A control entry is present but incomplete; retry once more bytes arrive.
    #[error("need more data")]
    CommandParseNeedMoreData,

    /// A fixed-size control field was truncated.
    #[error("insufficient input")]
    InsufficientInput,

    /// Propagated failure from a sink-handle callback (I/O, typically).
    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Abbreviation of `Result<T, FluxError>`, mirroring the teacher's `HdbResult<T>`.
pub type FluxResult<T> = std::result::Result<T, FluxError>;
