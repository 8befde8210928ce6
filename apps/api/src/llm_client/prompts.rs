// Cross-cutting prompt fragments. Feature prompts live next to their callers.

/// Appended to every answer prompt so the model does not invent facts.
pub const TRUTHFULNESS_INSTRUCTION: &str = "\
    CRITICAL: Only state facts supported by the candidate profile provided. \
    Do NOT invent employers, degrees, certifications, numbers or dates. \
    If the profile does not support an answer, reply with the single word \"unsure\".";
