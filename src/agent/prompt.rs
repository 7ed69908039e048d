//! Built-in DataBot system instruction

use crate::tools::BuiltinTool;

const PREAMBLE: &str = "Eres DataBot, un asistente de IA de DATAPATH.

Tu objetivo es ayudar a los usuarios respondiendo sus preguntas.";

const GUIDELINES: &str = "- Para saludos, agradecimientos o conversación general, responde directamente SIN usar herramientas.
- Recuerdas toda la conversación gracias a tu memoria persistente.
- Responde siempre en español de manera clara y amigable.

EJEMPLOS de cuándo NO usar herramientas:
- \"Hola\" → Responde con un saludo
- \"Gracias\" → Responde amablemente
- \"¿Cómo estás?\" → Responde conversacionalmente";

/// Default system instruction, mentioning only the capabilities offered.
pub fn default_system_prompt(tool_names: &[&str]) -> String {
    let knowledge = BuiltinTool::KnowledgeBase.as_str();
    let web = BuiltinTool::WebSearch.as_str();
    let has_knowledge = tool_names.contains(&knowledge);
    let has_web = tool_names.contains(&web);

    let mut prompt = String::from(PREAMBLE);
    prompt.push_str("\n\nINSTRUCCIONES:\n");
    if has_knowledge {
        prompt.push_str(&format!(
            "- Para preguntas sobre DATAPATH (programas, cursos, precios, docentes), USA la herramienta {}.\n",
            knowledge
        ));
    }
    if has_web {
        prompt.push_str(&format!(
            "- Para información general o actual que no sea de DATAPATH, puedes usar {}.\n",
            web
        ));
    }
    prompt.push_str(GUIDELINES);

    if has_knowledge {
        prompt.push_str(&format!(
            "\n\nEJEMPLOS de cuándo SÍ usar {k}:
- \"¿Qué cursos tienen?\" → Usa {k}
- \"¿Cuánto cuesta el programa de IA?\" → Usa {k}
- \"¿Quiénes son los docentes?\" → Usa {k}",
            k = knowledge
        ));
    }

    prompt
}
