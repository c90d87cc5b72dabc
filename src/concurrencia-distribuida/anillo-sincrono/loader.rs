//! De dónde salen los uids: un archivo `input.dat`, una lista literal o el azar.

use std::fs;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::LoadError;

fn parse_tokens(text: &str) -> Result<Vec<i64>, LoadError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse().map_err(|_| LoadError::Parse {
                token: token.to_owned(),
            })
        })
        .collect()
}

/// Lista literal: `"18, 17 14,15"`.
pub fn parse_list(text: &str) -> Result<Vec<i64>, LoadError> {
    parse_tokens(text)
}

/// Formato de archivo: primero la cantidad N, después los N uids.
pub fn parse_counted(text: &str) -> Result<Vec<i64>, LoadError> {
    let mut numbers = parse_tokens(text)?;
    if numbers.is_empty() {
        return Ok(numbers);
    }
    let announced = numbers.remove(0);
    let expected = usize::try_from(announced).map_err(|_| LoadError::Parse {
        token: announced.to_string(),
    })?;
    if numbers.len() != expected {
        return Err(LoadError::CountMismatch {
            expected,
            found: numbers.len(),
        });
    }
    Ok(numbers)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<i64>, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_counted(&text)
}

/// `count` uids distintos elegidos al azar de `1..=max_uid`.
pub fn random_uids<R: Rng + ?Sized>(
    count: usize,
    max_uid: u32,
    rng: &mut R,
) -> Result<Vec<i64>, LoadError> {
    if count > max_uid as usize {
        return Err(LoadError::TooFewCandidates {
            requested: count,
            max_uid,
        });
    }
    let mut candidates: Vec<i64> = (1..=i64::from(max_uid)).collect();
    candidates.shuffle(rng);
    candidates.truncate(count);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn parses_mixed_separators() {
        assert_eq!(parse_list("18, 17 14,15\n32").unwrap(), vec![18, 17, 14, 15, 32]);
        assert_eq!(parse_list("  ").unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn reports_bad_tokens() {
        assert!(matches!(
            parse_list("3, x, 4"),
            Err(LoadError::Parse { token }) if token == "x"
        ));
    }

    #[test]
    fn counted_format_checks_header() {
        assert_eq!(parse_counted("5\n18 17 14 15 32\n").unwrap(), vec![18, 17, 14, 15, 32]);
        assert!(matches!(
            parse_counted("3\n1 2"),
            Err(LoadError::CountMismatch {
                expected: 3,
                found: 2
            })
        ));
        assert!(matches!(parse_counted("-1 2"), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("anillo-{}.dat", std::process::id()));
        fs::write(&path, "3\n5 4 3\n").unwrap();
        let loaded = load_file(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap(), vec![5, 4, 3]);

        assert!(matches!(
            load_file("/definitely/not/here.dat"),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn random_uids_are_distinct_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let uids = random_uids(10, 12, &mut rng).unwrap();
        assert_eq!(uids.len(), 10);
        assert_eq!(uids.iter().collect::<HashSet<_>>().len(), 10);
        assert!(uids.iter().all(|uid| (1..=12).contains(uid)));

        assert!(matches!(
            random_uids(5, 4, &mut rng),
            Err(LoadError::TooFewCandidates {
                requested: 5,
                max_uid: 4
            })
        ));
    }
}
