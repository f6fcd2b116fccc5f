//! Keyed JSON document source
//!
//! Reads a document whose root is an object mapping record identifiers to
//! record bodies:
//!
//! ```json
//! {"AEAJM": {"name": "Ajman", "coordinates": [55.5136, 25.4052]}}
//! ```
//!
//! Entries are decoded one at a time on a blocking worker and pushed as they
//! complete, so memory use is bounded by the channel capacity rather than the
//! document size. The member name is injected as the record key, overwriting
//! any key found in the body.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use ports_common::types::{inject_key, Keyed};
use ports_common::{PortsError, Result};
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::Deserializer as _;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::{Production, Source};

/// Streams records of type `T` out of a keyed JSON file.
pub struct FileSource<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> FileSource<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }
}

impl<T> Source for FileSource<T>
where
    T: Keyed + DeserializeOwned + Send + 'static,
{
    type Item = T;

    fn start(self, capacity: usize, cancel: CancellationToken) -> Result<Production<T>> {
        if capacity == 0 {
            return Err(PortsError::InvalidCapacity(capacity));
        }

        let file = File::open(&self.path).map_err(|source| PortsError::Open {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), capacity, "Streaming records from file");

        let (tx, rx) = mpsc::channel(capacity);
        let path = self.path;
        let worker = tokio::task::spawn_blocking(move || {
            decode_entries(&path, BufReader::new(file), &tx, &cancel)
        });

        Ok(Production::with_worker(rx, worker))
    }
}

/// Decode every entry of the root object onto `tx`.
///
/// Returns `Ok` when the document was fully consumed or when the consumer
/// stopped early (cancelled or dropped). Any decode failure ends the stream
/// and is returned as [`PortsError::Decode`].
fn decode_entries<T, R>(
    path: &Path,
    reader: R,
    tx: &mpsc::Sender<T>,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: Keyed + DeserializeOwned,
    R: Read,
{
    let mut de = serde_json::Deserializer::from_reader(reader);
    let mut emitted = 0u64;
    let mut stopped = false;

    let decoded = (&mut de)
        .deserialize_map(EntryVisitor {
            tx,
            cancel,
            emitted: &mut emitted,
            stopped: &mut stopped,
            _record: PhantomData,
        })
        .and_then(|()| de.end());

    if stopped {
        debug!(path = %path.display(), emitted, "Consumer stopped before end of document");
        return Ok(());
    }

    match decoded {
        Ok(()) => {
            info!(path = %path.display(), emitted, "Finished reading document");
            Ok(())
        },
        Err(source) => {
            error!(
                path = %path.display(),
                emitted,
                error = %source,
                "Document decoding stopped early"
            );
            Err(PortsError::Decode {
                path: path.to_path_buf(),
                source,
            })
        },
    }
}

struct EntryVisitor<'a, T> {
    tx: &'a mpsc::Sender<T>,
    cancel: &'a CancellationToken,
    emitted: &'a mut u64,
    stopped: &'a mut bool,
    _record: PhantomData<fn() -> T>,
}

impl<'de, T> Visitor<'de> for EntryVisitor<'_, T>
where
    T: Keyed + DeserializeOwned,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object mapping record identifiers to records")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        while let Some(key) = map.next_key::<String>()? {
            let mut record: T = map
                .next_value()
                .map_err(|e| de::Error::custom(format_args!("record {key:?}: {e}")))?;

            if key.is_empty() {
                return Err(de::Error::custom("empty record identifier"));
            }
            trace!(key = %key, "Decoded record");
            inject_key(&mut record, key);

            if self.cancel.is_cancelled() || self.tx.blocking_send(record).is_err() {
                *self.stopped = true;
                return Ok(());
            }
            *self.emitted += 1;
        }

        Ok(())
    }
}
