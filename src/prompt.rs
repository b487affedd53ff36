//! Fixed wording sent with every classification request.

/// Role-setting system message.
pub const SYSTEM_PROMPT: &str = "You are a US stock market expert analyst.";

/// Instructional template. `{text}` is replaced by the record text.
pub const SENTIMENT_PROMPT: &str = r#"You are an expert in US equities and in analysing text scraped from the DCInside stock gallery.
The data comes from an anonymous community, so slang, sarcasm and blunt statements are mixed freely.
Taking the nature of the community into account, analyse the following post/comment thoroughly and decide whether it expresses a buy or a sell opinion.

Rules:
1. Positive / optimistic / expects a rise / recommends buying -> 1 (buy)
2. Neutral or hard to judge -> 0 (neutral)
3. Negative / pessimistic / expects a fall / recommends selling -> -1 (sell)

**Important**: output exactly one integer (1, 0 or -1).
Return only the number, with no explanation or any other text.

Text to analyse:
{text}

Output (number only):"#;

/// Fills the template with `text`.
pub fn render(text: &str) -> String {
    SENTIMENT_PROMPT.replace("{text}", text)
}
