use regex::Regex;

/// Strip a markdown fence (```json ... ```) wrapping a model reply, leaving
/// the bare JSON text. Replies without a fence are returned trimmed.
pub fn clean_json(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(re) = Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$") {
        if let Some(cap) = re.captures(trimmed) {
            return cap[1].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Normalize generated code for transmission: strip a wrapping markdown
/// fence (```python ... ```) and surrounding whitespace. The returned form
/// is the canonical "code that ran" for the rest of the pipeline.
pub fn strip_code_fences(code: &str) -> String {
    let trimmed = code.trim();
    if let Ok(re) = Regex::new(r"(?s)^```(?:python)?\s*(.*?)\s*```$") {
        if let Some(cap) = re.captures(trimmed) {
            return cap[1].trim().to_string();
        }
    }
    trimmed.to_string()
}
