//! Deferred, memoised contents and linkname values.

use sha2::{Digest, Sha256};

use crate::ContentsError;

/// A SHA-256 digest.
pub type Sha256Sum = [u8; 32];

/// Computes the SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> Sha256Sum {
    Sha256::digest(data).into()
}

type Producer<'a, T> = Box<dyn FnOnce() -> Result<T, ContentsError> + 'a>;

/// Deferred byte contents with a cached SHA-256.
///
/// The producer runs at most once, no matter how many times the contents or
/// the digest are requested; a producer failure is cached and returned on
/// every subsequent call. A default-constructed cell stands for "no
/// contents": empty bytes and the digest of the empty string.
pub struct LazyContents<'a> {
    producer: Option<Producer<'a, Vec<u8>>>,
    memo: Option<Result<(Vec<u8>, Sha256Sum), ContentsError>>,
}

impl Default for LazyContents<'_> {
    fn default() -> Self {
        Self::from_bytes(Vec::new())
    }
}

impl std::fmt::Debug for LazyContents<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyContents")
            .field("evaluated", &self.memo.is_some())
            .finish()
    }
}

impl<'a> LazyContents<'a> {
    /// Creates a cell that will obtain its contents from `producer` on first
    /// access.
    #[must_use]
    pub fn new(producer: impl FnOnce() -> Result<Vec<u8>, ContentsError> + 'a) -> Self {
        Self {
            producer: Some(Box::new(producer)),
            memo: None,
        }
    }

    /// Creates a cell with no producer at all; the bytes are supplied on
    /// first access through [`contents_with`](Self::contents_with) or
    /// [`sha256_with`](Self::sha256_with).
    #[must_use]
    pub fn new_unfilled() -> Self {
        Self {
            producer: None,
            memo: None,
        }
    }

    /// Creates an already-evaluated cell holding `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let digest = sha256(&bytes);
        Self {
            producer: None,
            memo: Some(Ok((bytes, digest))),
        }
    }

    fn force(
        &mut self,
        fallback: Option<Producer<'_, Vec<u8>>>,
    ) -> &Result<(Vec<u8>, Sha256Sum), ContentsError> {
        if self.memo.is_none() {
            let produced = match self.producer.take() {
                Some(produce) => Some(produce()),
                None => fallback.map(|produce| produce()),
            };
            let result = match produced {
                Some(bytes) => bytes.map(|bytes| {
                    let digest = sha256(&bytes);
                    (bytes, digest)
                }),
                None => Ok((Vec::new(), sha256(&[]))),
            };
            self.memo = Some(result);
        }
        self.memo.as_ref().unwrap()
    }

    /// Returns the contents, invoking the producer if this is the first
    /// access.
    pub fn contents(&mut self) -> Result<&[u8], ContentsError> {
        match self.force(None) {
            Ok((bytes, _)) => Ok(bytes),
            Err(error) => Err(error.clone()),
        }
    }

    /// Returns the SHA-256 of the contents, producing them if necessary.
    pub fn contents_sha256(&mut self) -> Result<Sha256Sum, ContentsError> {
        match self.force(None) {
            Ok((_, digest)) => Ok(*digest),
            Err(error) => Err(error.clone()),
        }
    }

    /// Like [`contents`](Self::contents), but uses `produce` when the cell
    /// was constructed without a producer. Destination snapshots use this to
    /// read through a filesystem handle supplied at access time.
    pub fn contents_with(
        &mut self,
        produce: impl FnOnce() -> Result<Vec<u8>, ContentsError>,
    ) -> Result<&[u8], ContentsError> {
        match self.force(Some(Box::new(produce))) {
            Ok((bytes, _)) => Ok(bytes),
            Err(error) => Err(error.clone()),
        }
    }

    /// Like [`contents_sha256`](Self::contents_sha256) with an access-time
    /// producer.
    pub fn sha256_with(
        &mut self,
        produce: impl FnOnce() -> Result<Vec<u8>, ContentsError>,
    ) -> Result<Sha256Sum, ContentsError> {
        match self.force(Some(Box::new(produce))) {
            Ok((_, digest)) => Ok(*digest),
            Err(error) => Err(error.clone()),
        }
    }
}

/// Deferred symlink target with the same memoisation contract as
/// [`LazyContents`].
pub struct LazyLinkname<'a> {
    producer: Option<Producer<'a, String>>,
    memo: Option<Result<String, ContentsError>>,
}

impl Default for LazyLinkname<'_> {
    fn default() -> Self {
        Self::from_string(String::new())
    }
}

impl std::fmt::Debug for LazyLinkname<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyLinkname")
            .field("evaluated", &self.memo.is_some())
            .finish()
    }
}

impl<'a> LazyLinkname<'a> {
    /// Creates a cell that will obtain the linkname from `producer` on first
    /// access.
    #[must_use]
    pub fn new(producer: impl FnOnce() -> Result<String, ContentsError> + 'a) -> Self {
        Self {
            producer: Some(Box::new(producer)),
            memo: None,
        }
    }

    /// Creates a cell with no producer; the linkname is supplied on first
    /// access through [`linkname_with`](Self::linkname_with).
    #[must_use]
    pub fn new_unfilled() -> Self {
        Self {
            producer: None,
            memo: None,
        }
    }

    /// Creates an already-evaluated cell.
    #[must_use]
    pub fn from_string(linkname: String) -> Self {
        Self {
            producer: None,
            memo: Some(Ok(linkname)),
        }
    }

    fn force(&mut self, fallback: Option<Producer<'_, String>>) -> &Result<String, ContentsError> {
        if self.memo.is_none() {
            let result = match self.producer.take() {
                Some(produce) => produce(),
                None => match fallback {
                    Some(produce) => produce(),
                    None => Ok(String::new()),
                },
            };
            self.memo = Some(result);
        }
        self.memo.as_ref().unwrap()
    }

    /// Returns the linkname, invoking the producer if this is the first
    /// access.
    pub fn linkname(&mut self) -> Result<&str, ContentsError> {
        match self.force(None) {
            Ok(linkname) => Ok(linkname),
            Err(error) => Err(error.clone()),
        }
    }

    /// Like [`linkname`](Self::linkname) with an access-time producer.
    pub fn linkname_with(
        &mut self,
        produce: impl FnOnce() -> Result<String, ContentsError>,
    ) -> Result<&str, ContentsError> {
        match self.force(Some(Box::new(produce))) {
            Ok(linkname) => Ok(linkname),
            Err(error) => Err(error.clone()),
        }
    }
}
