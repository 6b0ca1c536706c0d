use crate::error::RaceError;
use crate::types::{Gender, Participant};

/// Parse an uploaded roster of `name,gender` rows.
///
/// Rows with fewer than two cells, an empty name or a gender other than
/// M/F are skipped; a `name,gender` header falls out through the gender
/// check. Extra columns are ignored.
pub fn parse_roster_csv(text: &str) -> Result<Vec<Participant>, RaceError> {
    let text = text.trim_start_matches('\u{feff}');
    let participants: Vec<Participant> = text
        .lines()
        .filter_map(|line| {
            let cells = split_csv_line(line);
            if cells.len() < 2 {
                return None;
            }
            let name = cells[0].trim();
            let gender = Gender::parse(&cells[1])?;
            if name.is_empty() {
                return None;
            }
            Some(Participant::new(name, gender))
        })
        .collect();

    if participants.is_empty() {
        return Err(RaceError::NoValidParticipants);
    }
    Ok(participants)
}

/// Split one CSV record, honouring double quotes and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !line.is_empty() {
        cells.push(current);
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_header_and_bad_rows() {
        let csv = "name,gender\nAlice,F\n bob , m \n,M\nCarol\nDave,X\n\nEve,f,extra\n";
        let roster = parse_roster_csv(csv).unwrap();
        assert_eq!(
            roster,
            vec![
                Participant::new("Alice", Gender::F),
                Participant::new("bob", Gender::M),
                Participant::new("Eve", Gender::F),
            ]
        );
    }

    #[test]
    fn test_parse_handles_quotes_and_crlf() {
        let csv = "\u{feff}\"Smith, Jo\",F\r\n\"Lee \"\"Ace\"\"\",M\r\n";
        let roster = parse_roster_csv(csv).unwrap();
        assert_eq!(roster[0].name, "Smith, Jo");
        assert_eq!(roster[1].name, "Lee \"Ace\"");
        assert_eq!(roster[1].gender, Gender::M);
    }

    #[test]
    fn test_parse_with_nothing_valid() {
        assert!(matches!(parse_roster_csv("name,gender\n"), Err(RaceError::NoValidParticipants)));
        assert!(matches!(parse_roster_csv(""), Err(RaceError::NoValidParticipants)));
    }
}
