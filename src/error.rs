use core::fmt;

/// An error type representing the codec's erroneous conditions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    repr: Repr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Repr {
    Asn1(der::Error),
    Simple(ErrorKind),
}

impl Error {
    /// The kind of this error. ASN.1 library errors report `ErrorKind::Encoding`.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            Repr::Asn1(_) => ErrorKind::Encoding,
            Repr::Simple(kind) => kind,
        }
    }

    /// The underlying ASN.1 error, if any.
    pub fn asn1(&self) -> Option<der::Error> {
        match self.repr {
            Repr::Asn1(err) => Some(err),
            Repr::Simple(_) => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            repr: Repr::Simple(kind),
        }
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error {
            repr: Repr::Asn1(err),
        }
    }
}

impl From<der::ErrorKind> for Error {
    fn from(kind: der::ErrorKind) -> Error {
        der::Error::from(kind).into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Asn1(err) => write!(fmt, "ASN.1 error: {}", err),
            Repr::Simple(kind) => write!(fmt, "{}", kind.as_str()),
        }
    }
}

/// A list of specific error causes. Each kind is converted into `Error` type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Input does not fit a fixed-size field. Nothing was written.
    LengthMismatch,
    /// A validity integer is outside the range its encoding can carry.
    OutOfRange,
    /// Build or sign was called before the required fields were set.
    IncompleteState,
    /// The secure element reported a failure.
    CapabilityFailure,
    /// DER input does not have the expected structure.
    FormatMismatch,
    /// DER input lacks the authority key identifier extension.
    NotFound,
    /// ASN.1 encoding or decoding failed.
    Encoding,
    /// Predicted and written lengths disagree.
    AssertFailure,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            LengthMismatch => "input length does not match the field capacity",
            OutOfRange => "value is out of the encodable range",
            IncompleteState => "required fields are not set for this operation",
            CapabilityFailure => "secure element operation failed",
            FormatMismatch => "input does not have the expected DER structure",
            NotFound => "expected extension is not present",
            Encoding => "ASN.1 encoding failed",
            AssertFailure => "failed run-time consistency check",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}
