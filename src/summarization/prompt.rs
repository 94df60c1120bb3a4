/// Maximum number of sentences requested for the executive summary.
pub const MAX_SUMMARY_SENTENCES: usize = 5;

/// Build the single-turn instruction for the language model.
///
/// The transcript is embedded verbatim, even when empty.
pub fn build_prompt(transcript: &str, insight_count: usize) -> String {
    format!(
        "Você é um assistente que analisa transcrições de reuniões e conversas.\n\
         Com base na transcrição abaixo, produza:\n\
         1. Um resumo executivo com no máximo {max_sentences} frases.\n\
         2. Exatamente {insight_count} insights ou próximos passos, em formato de tópicos curtos.\n\n\
         Responda SOMENTE com um objeto JSON, sem texto antes ou depois, no formato:\n\
         {{\"resumo\": \"...\", \"insights\": [\"...\", \"...\"]}}\n\n\
         Transcrição:\n\
         {transcript}",
        max_sentences = MAX_SUMMARY_SENTENCES,
        insight_count = insight_count,
        transcript = transcript,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_transcript_verbatim() {
        let transcript = "  Falante A: vamos fechar o orçamento.\nFalante B: até sexta.  ";
        let prompt = build_prompt(transcript, 5);
        assert!(prompt.ends_with(transcript));
    }

    #[test]
    fn test_prompt_states_reply_shape_and_counts() {
        let prompt = build_prompt("texto", 5);
        assert!(prompt.contains(r#"{"resumo": "...", "insights": ["...", "..."]}"#));
        assert!(prompt.contains("no máximo 5 frases"));
        assert!(prompt.contains("Exatamente 5 insights"));

        assert!(build_prompt("texto", 3).contains("Exatamente 3 insights"));
    }

    #[test]
    fn test_prompt_with_empty_transcript() {
        let prompt = build_prompt("", 5);
        assert!(prompt.ends_with("Transcrição:\n"));
    }
}
