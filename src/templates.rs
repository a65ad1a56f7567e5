//! Prompt text for packs and for single-topic runs.
//!
//! Everything here is plain formatting; the rules embedded in the prompts
//! (9:16, no on-image text, word and hashtag ranges, closing CTA) are the same
//! ones the validators check afterwards.

/// Literal marker in the video-assembly prompt that receives the script.
pub const INVIDEO_MARKER: &str = "[roteiro Chatgpt]";

/// System instruction sent with every pack generation call.
pub const MASTER_SYSTEM: &str = "Você é um redator e diretor de conteúdo para TikTok em pt-BR.
Regras gerais:
- Formato vertical 9:16.
- Sem marcações de tempo nos roteiros.
- Frases curtas, objetivas; no máx. 1 emoji por bloco (quando fizer sentido).
- CTA curto: “Link na bio” ou “Link no perfil”.
- Evite jargões; fale como quem recomenda um achado real.

Para PROMPTS DE IMAGEM:
- Entregue 6 variações, cada uma com um título curto e 1 parágrafo (1–2 frases).
- Sem texto sobre a imagem; explicite 9:16; foco no produto e contexto real de uso.

Para DESCRIÇÕES:
- 1–2 parágrafos + bullets opcionais + 10–15 hashtags relevantes (evite genéricas demais).

Se receber URLs de imagens (Shopee), trate como referência visual (cores, ângulos, contexto).

Para InVideo:
- Respeite: “No Captions, No avatar, No Narrator image.”
- O roteiro final será inserido num template; você não precisa gerar esse template.
";

/// Appended to every scenes prompt before it is sent.
pub const SCENES_REINFORCEMENT: &str = "\n\n[REQUISITOS OBRIGATÓRIOS — IMAGENS]
- Proporção estrita: 9:16 (vertical).
- A imagem NÃO pode conter textos, legendas, marcas d’água ou overlays.
- Descreva apenas a cena/elementos visuais (sem pedir textos na imagem).
";

/// The four prompt files of one pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPrompts {
    pub scenes: String,
    pub script: String,
    pub video_assembly: String,
    pub description: String,
}

pub fn render_pack_prompts(product: &str, image_urls: &[String], guide: Option<&str>) -> PackPrompts {
    let mut scenes = Vec::new();
    if let Some(guide) = guide.map(str::trim).filter(|g| !g.is_empty()) {
        scenes.push(format!("# Contexto (guia)\n{guide}\n"));
    }
    scenes.push(format!(
        "Você vai propor 6 ideias visuais para o produto: **{product}**."
    ));
    scenes.push(
        "- Regras obrigatórias para TODAS as ideias: proporção **9:16 (vertical)** e **sem textos/legendas/overlays** na imagem.\n\
         - Descreva apenas a cena e os elementos visuais (nada de escrever texto na imagem)."
            .to_string(),
    );
    if !image_urls.is_empty() {
        scenes.push(format!(
            "Referências visuais (imagens reais do produto):\n{}",
            image_urls.join("\n")
        ));
    }

    let script = format!(
        "Gere um roteiro curto em pt-BR para TikTok do produto **{product}**.
Regras:
- Frases curtas, objetivas; máximo ~160 palavras no total.
- Estrutura: gancho/dor → benefício/curiosidade → prova simples → CTA curto (\"Link na bio\" ou \"Link no perfil\").
- Sem marcações de tempo.
- Linguagem natural, sem jargões."
    );

    let video_assembly = format!(
        "Esse é o roteiro do meu vídeo de vendas para o tiktok, dimensões 9:16. O produto é **{product}**.
Important: No Captions, No avatar, No Narrator image. Crie a voz com essas falas:
No Captions, No avatar, No Narrator image.

{INVIDEO_MARKER}"
    );

    let description = format!(
        "Escreva uma descrição curta para o vídeo do produto **{product}** em pt-BR,
com 1–2 parágrafos + (opcional) bullets curtos e 10–15 hashtags relevantes (evite genéricas demais)."
    );

    PackPrompts {
        scenes: scenes.join("\n").trim().to_string(),
        script,
        video_assembly,
        description,
    }
}

/// System and user prompt for a single-topic script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPrompt {
    pub system: String,
    pub user: String,
}

pub fn render_topic_prompt(topic: &str, style: &str, duration_secs: u32, language: &str) -> TopicPrompt {
    TopicPrompt {
        system: format!(
            "Você é roteirista especialista em vídeos curtos. Estilo: {style}. Idioma: {language}. Duração: {duration_secs}s."
        ),
        user: format!(
            "Crie um roteiro persuasivo para 9:16 sobre '{topic}'. \
             Abertura com dor/gancho; curiosidade; benefícios/prova; CTA. \
             Apenas o texto, sem marcação de tempo."
        ),
    }
}
