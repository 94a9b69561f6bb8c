use thiserror::Error;

/// Input problems caught before any store or provider call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown status '{0}' (expected applied, interview, offered, rejected, accepted)")]
    UnknownStatus(String),

    #[error("unknown content type '{0}' (expected resume, email, referral, linkedin, cover)")]
    UnknownContentKind(String),

    #[error("unknown sort field '{0}' (expected company, role, applied, status)")]
    UnknownSortField(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("nothing to update")]
    EmptyPatch,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials. Please check the email and password.")]
    InvalidCredentials,

    #[error("An account with email '{0}' already exists")]
    AccountExists(String),

    #[error("Not logged in. Run 'jobflow login' first.")]
    NotLoggedIn,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("unsupported file type '{0}': only PDF and DOCX are accepted")]
    UnsupportedType(String),

    #[error("file is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
}
