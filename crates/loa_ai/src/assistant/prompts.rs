use crate::index::RetrievalHit;

/// Base persona for grounded answers. Spanish, because every user-visible
/// string in the pipeline is Spanish.
const PERSONA: &str = "Eres un asistente de orientación legal para personas en Chile. \
Explicas conceptos legales en lenguaje simple y cercano, sin tecnicismos innecesarios. \
Entregas orientación general, nunca asesoría legal formal ni representación, y lo dices \
cuando corresponde.";

/// System prompt for a grounded answer: persona, the retrieved context
/// block, and the non-negotiable grounding instructions.
pub fn grounded_system_prompt(hits: &[RetrievalHit]) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str(PERSONA);
    out.push_str("\n\nCONTEXTO LEGAL RELEVANTE:\n");

    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("\n[Fuente {}] {}\n", i + 1, hit.title));
        if let Some(article) = &hit.article_number {
            out.push_str(&format!("Artículo: {article}\n"));
        }
        out.push_str(&format!("Categoría: {}\n", hit.category));
        out.push_str(&format!("Texto: {}\n", hit.text));
        if let Some(url) = &hit.url {
            out.push_str(&format!("URL: {url}\n"));
        }
    }

    out.push_str(
        "\nReglas (no negociables):\n\
         1) Cita las fuentes que uses, nombrándolas como [Fuente N].\n\
         2) Prioriza el contexto anterior por sobre tu conocimiento general.\n\
         3) Si el contexto no cubre la pregunta, dilo claramente en vez de completar con \
         conocimiento general.\n\
         4) Nunca inventes citas, artículos ni leyes que no estén en el contexto.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, article: Option<&str>) -> RetrievalHit {
        RetrievalHit {
            chunk_id: "x_0".to_string(),
            score: 0.9,
            title: title.to_string(),
            category: "laboral".to_string(),
            article_number: article.map(|a| a.to_string()),
            url: Some("https://example.cl".to_string()),
            source_id: "x".to_string(),
            text: "El finiquito debe constar por escrito.".to_string(),
        }
    }

    #[test]
    fn prompt_enumerates_sources_and_rules() {
        let prompt = grounded_system_prompt(&[
            hit("Guía sobre Finiquito", None),
            hit("Código del Trabajo", Some("177")),
        ]);
        assert!(prompt.contains("CONTEXTO LEGAL RELEVANTE"));
        assert!(prompt.contains("[Fuente 1] Guía sobre Finiquito"));
        assert!(prompt.contains("[Fuente 2] Código del Trabajo"));
        assert!(prompt.contains("Artículo: 177"));
        assert!(prompt.contains("Nunca inventes citas"));
        assert!(prompt.contains("Prioriza el contexto"));
    }
}
