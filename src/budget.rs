/// Estimate how many target-language syllables fit a segment's window.
///
/// `floor((end_time - start_time) * speech_rate)`, never less than one. Used
/// to cap translation length before synthesis; synthesized clips can still
/// overrun their window, which the assembler reconciles afterwards.
pub fn estimate_budget(start_time: f64, end_time: f64, speech_rate: f64) -> u32 {
    let raw = ((end_time - start_time) * speech_rate).floor();
    if !raw.is_finite() || raw < 1.0 {
        return 1;
    }
    if raw >= u32::MAX as f64 {
        u32::MAX
    } else {
        raw as u32
    }
}
