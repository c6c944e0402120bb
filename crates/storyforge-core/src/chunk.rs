//! Fixed-size overlapping window chunker.
//!
//! Splits document text into windows of at most `chunk_size` characters.
//! Window `i` starts at character `i * (chunk_size - chunk_overlap)`, so
//! every window after the first repeats the last `chunk_overlap`
//! characters of its predecessor. The final window always ends at the end
//! of the text and may be shorter.
//!
//! Sizes are measured in Unicode scalar values, and cuts always land on
//! `char` boundaries, so multi-byte text never splits mid-character.

use crate::error::PipelineError;

/// Validated chunking parameters. `chunk_overlap < chunk_size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingParams {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::configuration("chunk_size must be > 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(PipelineError::configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// One window of document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    /// Position of this window in the document, starting at 0.
    pub index: usize,
    /// Character offset of the window's first character.
    pub start: usize,
    pub text: String,
}

impl TextWindow {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Split `text` into overlapping windows. Empty input yields no windows.
pub fn chunk_text(text: &str, params: &ChunkingParams) -> Vec<TextWindow> {
    // Byte offset of every char, so windows can be sliced without copying chars.
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total = offsets.len();
    let mut windows = Vec::new();

    let mut start = 0usize;
    while start < total {
        let end = (start + params.chunk_size).min(total);
        let byte_start = offsets[start];
        let byte_end = if end == total {
            text.len()
        } else {
            offsets[end]
        };

        windows.push(TextWindow {
            index: windows.len(),
            start,
            text: text[byte_start..byte_end].to_string(),
        });

        if end == total {
            break;
        }
        start += params.stride();
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the source by dropping each window's overlap with its predecessor.
    fn reconstruct(windows: &[TextWindow], params: &ChunkingParams) -> String {
        let mut out = String::new();
        let mut covered = 0usize;
        for w in windows {
            let skip = covered.saturating_sub(w.start);
            out.extend(w.text.chars().skip(skip));
            covered = w.start + w.len();
        }
        assert!(windows.iter().all(|w| w.len() <= params.chunk_size()));
        out
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(ChunkingParams::new(100, 100).is_err());
        assert!(ChunkingParams::new(100, 150).is_err());
        assert!(ChunkingParams::new(0, 0).is_err());
        assert!(ChunkingParams::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text() {
        let windows = chunk_text("", &ChunkingParams::default());
        assert!(windows.is_empty());
    }

    #[test]
    fn test_short_text_single_window() {
        let windows = chunk_text("Hello, world!", &ChunkingParams::default());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, "Hello, world!");
        assert_eq!(windows[0].start, 0);
    }

    #[test]
    fn test_2500_chars_with_1000_200() {
        let text: String = (0..2500).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let params = ChunkingParams::new(1000, 200).unwrap();
        let windows = chunk_text(&text, &params);

        let lens: Vec<usize> = windows.iter().map(|w| w.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 900]);
        for pair in windows.windows(2) {
            let prev_end = pair[0].start + pair[0].len();
            assert_eq!(pair[1].start, prev_end - 200);
        }
        assert_eq!(reconstruct(&windows, &params), text);
    }

    #[test]
    fn test_2300_chars_with_1000_200() {
        let text = "x".repeat(2300);
        let windows = chunk_text(&text, &ChunkingParams::new(1000, 200).unwrap());
        let lens: Vec<usize> = windows.iter().map(|w| w.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 700]);
    }

    #[test]
    fn test_exact_multiple_has_no_tail_window() {
        // 1800 = 1000 + 800: the second window ends exactly at the end.
        let text = "y".repeat(1800);
        let windows = chunk_text(&text, &ChunkingParams::new(1000, 200).unwrap());
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].start, 800);
        assert_eq!(windows[1].len(), 1000);
    }

    #[test]
    fn test_reconstruction_across_params() {
        let base = "The quick brown fox jumps over the lazy dog. Ünïcödé ✓ 日本語テキスト.\n\n";
        let text = base.repeat(37);
        for (size, overlap) in [(1, 0), (7, 3), (50, 0), (64, 63), (100, 20), (5000, 10)] {
            let params = ChunkingParams::new(size, overlap).unwrap();
            let windows = chunk_text(&text, &params);
            assert_eq!(
                reconstruct(&windows, &params),
                text,
                "size={} overlap={}",
                size,
                overlap
            );
            for (i, w) in windows.iter().enumerate() {
                assert_eq!(w.index, i);
            }
        }
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "é".repeat(10);
        let windows = chunk_text(&text, &ChunkingParams::new(4, 1).unwrap());
        assert!(windows.iter().all(|w| w.text.chars().all(|c| c == 'é')));
        assert_eq!(windows[0].len(), 4);
        assert_eq!(windows[1].start, 3);
    }
}
