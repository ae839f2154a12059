use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

use super::error::DocumentError;
use super::types::{Chunk, Document};

/// Structural boundaries tried in order: paragraph, line, word, then a hard cut.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Smallest accepted window; any single character fits in it.
pub const MIN_CHUNK_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Maximum tokens per chunk.
    pub chunk_size: usize,
    /// Tokens repeated between consecutive chunks of one segment.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitter`] if the window is too small or
    /// the overlap does not leave room for new text.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(DocumentError::InvalidSplitter(format!(
                "chunk_size must be at least {MIN_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DocumentError::InvalidSplitter(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

static CL100K: OnceLock<Arc<CoreBPE>> = OnceLock::new();

fn cl100k() -> Result<Arc<CoreBPE>, DocumentError> {
    if let Some(bpe) = CL100K.get() {
        return Ok(Arc::clone(bpe));
    }
    let bpe = Arc::new(
        tiktoken_rs::cl100k_base().map_err(|e| DocumentError::Tokenizer(e.to_string()))?,
    );
    Ok(Arc::clone(CL100K.get_or_init(|| bpe)))
}

/// Recursive token-bounded splitter measuring length in `cl100k_base` tokens.
#[derive(Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the tokenizer fails to load.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        config.validate()?;
        Ok(Self {
            config,
            bpe: cl100k()?,
        })
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split one segment. `chunk_index` starts at 0.
    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                token_count: self.count_tokens(&content),
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.split(d)).collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        if text.trim().is_empty() {
            return out;
        }
        self.split_recursive(text, &SEPARATORS, &mut out);
        out
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let sep = separators.get(idx).copied().unwrap_or("");
        if sep.is_empty() {
            self.hard_split(text, out);
            return;
        }
        let rest = &separators[idx + 1..];

        let mut fitting: Vec<&str> = Vec::new();
        for piece in text.split(sep).filter(|p| !p.trim().is_empty()) {
            if self.count_tokens(piece) <= self.config.chunk_size {
                fitting.push(piece);
            } else {
                if !fitting.is_empty() {
                    self.merge(&fitting, sep, out);
                    fitting.clear();
                }
                self.split_recursive(piece, rest, out);
            }
        }
        if !fitting.is_empty() {
            self.merge(&fitting, sep, out);
        }
    }

    /// Greedy window merge; a new window keeps the trailing pieces of the
    /// previous one that total at most `chunk_overlap` tokens.
    fn merge(&self, pieces: &[&str], sep: &str, out: &mut Vec<String>) {
        let joined = |window: &VecDeque<&str>, extra: Option<&str>| -> String {
            let mut s = String::new();
            for (i, p) in window.iter().copied().chain(extra).enumerate() {
                if i > 0 {
                    s.push_str(sep);
                }
                s.push_str(p);
            }
            s
        };

        let mut window: VecDeque<&str> = VecDeque::new();
        for &piece in pieces {
            if !window.is_empty()
                && self.count_tokens(&joined(&window, Some(piece))) > self.config.chunk_size
            {
                self.emit(&joined(&window, None), out);
                while !window.is_empty()
                    && (self.count_tokens(&joined(&window, None)) > self.config.chunk_overlap
                        || self.count_tokens(&joined(&window, Some(piece)))
                            > self.config.chunk_size)
                {
                    window.pop_front();
                }
            }
            window.push_back(piece);
        }
        if !window.is_empty() {
            self.emit(&joined(&window, None), out);
        }
    }

    /// Cut on character boundaries when no separator is left.
    fn hard_split(&self, text: &str, out: &mut Vec<String>) {
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let last = bounds.len() - 1;
        if last == 0 {
            return;
        }
        let tokens = |from: usize, to: usize| self.count_tokens(&text[bounds[from]..bounds[to]]);

        let mut start = 0;
        loop {
            let end = self.largest_fit(start, last, |to| tokens(start, to));
            self.emit(&text[bounds[start]..bounds[end]], out);
            if end == last {
                break;
            }

            let mut next = end;
            if self.config.chunk_overlap > 0 {
                let (mut lo, mut hi) = (start + 1, end);
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if tokens(mid, end) <= self.config.chunk_overlap {
                        hi = mid;
                    } else {
                        lo = mid + 1;
                    }
                }
                while lo < end && tokens(lo, end) > self.config.chunk_overlap {
                    lo += 1;
                }
                next = lo;
                if next < end && self.largest_fit(next, last, |to| tokens(next, to)) <= end {
                    next = end;
                }
            }
            start = next;
        }
    }

    /// Largest boundary index in `(start, last]` whose window fits, never less than `start + 1`.
    /// Gallops forward first so the cost follows the window length, not the text length.
    fn largest_fit(&self, start: usize, last: usize, tokens_to: impl Fn(usize) -> usize) -> usize {
        let mut lo = start + 1;
        let mut hi = last;
        let mut step = 1;
        while lo < last {
            let probe = (lo + step).min(last);
            if tokens_to(probe) <= self.config.chunk_size {
                lo = probe;
                step *= 2;
            } else {
                hi = probe - 1;
                break;
            }
        }
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            if tokens_to(mid) <= self.config.chunk_size {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        while lo > start + 1 && tokens_to(lo) > self.config.chunk_size {
            lo -= 1;
        }
        lo
    }

    fn emit(&self, raw: &str, out: &mut Vec<String>) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed.len() == raw.len() || self.count_tokens(trimmed) <= self.config.chunk_size {
            out.push(trimmed.to_owned());
        } else {
            out.push(raw.to_owned());
        }
    }
}
