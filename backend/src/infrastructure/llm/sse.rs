//! Décodage du flux Server-Sent Events renvoyé par `/chat/completions` en mode `stream`.

use serde::Deserialize;

/// Résultat de l'analyse d'une ligne du flux amont
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkParse {
    /// Fragment de texte à relayer
    Token(String),
    /// Ligne sans contenu utile ou illisible
    Skip,
    /// Marqueur de fin `[DONE]`
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Analyse une ligne SSE
pub fn parse_chunk(line: &str) -> ChunkParse {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return ChunkParse::Skip;
    };

    let data = data.trim();
    if data == "[DONE]" {
        return ChunkParse::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(ChunkParse::Token)
            .unwrap_or(ChunkParse::Skip),
        Err(e) => {
            tracing::debug!("Fragment amont illisible ignoré: {}", e);
            ChunkParse::Skip
        }
    }
}

/// Découpe les octets reçus en lignes, quelle que soit la frontière des paquets
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un paquet et renvoie l'analyse de chaque ligne complète
    pub fn push(&mut self, bytes: &[u8]) -> Vec<ChunkParse> {
        self.buffer.extend_from_slice(bytes);

        let mut parsed = Vec::new();
        while let Some(position) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            if !line.is_empty() {
                parsed.push(parse_chunk(line));
            }
        }

        parsed
    }

    /// Vide le reste du tampon en fin de flux
    pub fn finish(&mut self) -> Vec<ChunkParse> {
        if self.buffer.is_empty() {
            return Vec::new();
        }

        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        let line = line.trim();
        if line.is_empty() {
            Vec::new()
        } else {
            vec![parse_chunk(line)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_line(content: &str) -> String {
        format!(
            "data: {}",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    #[test]
    fn content_delta_is_a_token() {
        assert_eq!(parse_chunk(&token_line("Hel")), ChunkParse::Token("Hel".to_string()));
    }

    #[test]
    fn done_marker_ends_stream() {
        assert_eq!(parse_chunk("data: [DONE]"), ChunkParse::Done);
    }

    #[test]
    fn role_only_delta_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_chunk(line), ChunkParse::Skip);
    }

    #[test]
    fn malformed_and_non_data_lines_are_skipped() {
        assert_eq!(parse_chunk("data: {not json"), ChunkParse::Skip);
        assert_eq!(parse_chunk(": keep-alive"), ChunkParse::Skip);
        assert_eq!(parse_chunk("event: message"), ChunkParse::Skip);
    }

    #[test]
    fn decoder_handles_split_lines() {
        let mut decoder = SseDecoder::new();
        let full = format!("{}\r\n\r\n{}\n\ndata: [DONE]\n\n", token_line("Hel"), token_line("lo"));
        let (first, second) = full.as_bytes().split_at(17);

        let mut parsed = decoder.push(first);
        assert!(parsed.is_empty());
        parsed.extend(decoder.push(second));

        assert_eq!(
            parsed,
            vec![
                ChunkParse::Token("Hel".to_string()),
                ChunkParse::Token("lo".to_string()),
                ChunkParse::Done,
            ]
        );
    }

    #[test]
    fn decoder_keeps_multibyte_characters_across_packets() {
        let mut decoder = SseDecoder::new();
        let line = format!("{}\n", token_line("café"));
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut parsed = decoder.push(&bytes[..split]);
        parsed.extend(decoder.push(&bytes[split..]));

        assert_eq!(parsed, vec![ChunkParse::Token("café".to_string())]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![ChunkParse::Done]);
        assert!(decoder.finish().is_empty());
    }
}
