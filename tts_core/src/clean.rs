/// Markup characters that speech engines tend to read aloud.
const NOISE: [char; 3] = ['*', '#', '-'];

/// Clean text before it reaches a speech engine.
///
/// Removes markdown emphasis, heading and list markers and trims the result.
/// An empty return value means there is nothing worth speaking.
pub fn clean_for_speech(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| !NOISE.contains(c)).collect();
    cleaned.trim().to_string()
}
