use std::io::{BufRead, Write};

use anyhow::Result;

use platmark::platform::{parse_selection, Platform, PLATFORMS};

/// Ask on stdin which platforms to process.
pub fn prompt_platforms() -> Result<Vec<&'static Platform>> {
    let stdin = std::io::stdin();
    prompt_from(&mut stdin.lock(), &mut std::io::stderr())
}

/// Show the numbered menu and read answers until one selects at least one
/// platform.
pub fn prompt_from(input: &mut impl BufRead, out: &mut impl Write) -> Result<Vec<&'static Platform>> {
    writeln!(out, "\n📋 Platforms:")?;
    writeln!(out, "   0. all platforms")?;
    for (i, platform) in PLATFORMS.iter().enumerate() {
        writeln!(out, "  {:>2}. {}", i + 1, platform.display_name)?;
    }

    loop {
        write!(out, "\nSelect platforms (numbers, comma-separated, 0 = all): ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            anyhow::bail!("No platform selected (end of input)");
        }

        match parse_selection(&line) {
            Ok(selection) => {
                if !selection.out_of_range.is_empty() {
                    writeln!(
                        out,
                        "⚠️  Ignoring out-of-range entries: {}",
                        selection.out_of_range.join(", ")
                    )?;
                }
                if selection.platforms.is_empty() {
                    writeln!(out, "❌ No valid platform chosen, try again")?;
                    continue;
                }

                let names: Vec<_> = selection.platforms.iter().map(ToString::to_string).collect();
                writeln!(out, "✅ Selected: {}", names.join(", "))?;
                return Ok(selection.platforms);
            }
            Err(e) => writeln!(out, "❌ {e}, enter numbers only")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> (Result<Vec<&'static Platform>>, String) {
        let mut out = Vec::new();
        let result = prompt_from(&mut Cursor::new(text.to_string()), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn zero_selects_everything() {
        let (selected, _) = answer("0\n");
        assert_eq!(selected.unwrap().len(), PLATFORMS.len());
    }

    #[test]
    fn reprompts_until_valid() {
        let (selected, transcript) = answer("abc\n99\n1, 4\n");
        let keys: Vec<_> = selected.unwrap().iter().map(|p| p.key).collect();
        assert_eq!(keys, vec!["douyin", "weibo"]);
        assert!(transcript.contains("enter numbers only"));
        assert!(transcript.contains("Ignoring out-of-range entries: 99"));
        assert!(transcript.contains("Selected: 抖音精选 (douyin), 微博 (weibo)"));
    }

    #[test]
    fn end_of_input_is_an_error() {
        let (selected, _) = answer("\n");
        // a blank line selects nothing and the next read hits EOF
        assert!(selected.is_err());
    }
}
