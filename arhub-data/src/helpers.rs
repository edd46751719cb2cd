//! Identifier validation shared by the editing RPCs.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("Name has to be set.")]
    Empty,
    #[error("Name has to be snake_case.")]
    NotSnakeCase,
    #[error("Name has to be PascalCase.")]
    NotPascalCase,
    #[error("Name already exists.")]
    Exists,
}

/// Object, action-point and action names: `[a-z][a-z0-9_]*`.
pub fn check_snake_case(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_lowercase() {
        return Err(NameError::NotSnakeCase);
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(NameError::NotSnakeCase);
    }
    Ok(())
}

/// Object-type names: `[A-Z][A-Za-z0-9]*`.
pub fn check_pascal_case(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    let mut chars = name.chars();
    if !chars.next().unwrap_or('_').is_ascii_uppercase() {
        return Err(NameError::NotPascalCase);
    }
    if !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(NameError::NotPascalCase);
    }
    Ok(())
}

/// Checks that `name` is non-empty and not already taken.
pub fn check_unique_name<'a, I>(name: &str, existing: I) -> Result<(), NameError>
where
    I: IntoIterator<Item = &'a str>,
{
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if existing.into_iter().any(|n| n == name) {
        return Err(NameError::Exists);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_rules() {
        assert!(check_snake_case("box_1").is_ok());
        assert!(check_snake_case("robot").is_ok());
        assert_eq!(check_snake_case(""), Err(NameError::Empty));
        assert_eq!(check_snake_case("Box"), Err(NameError::NotSnakeCase));
        assert_eq!(check_snake_case("1box"), Err(NameError::NotSnakeCase));
        assert_eq!(check_snake_case("box-1"), Err(NameError::NotSnakeCase));
    }

    #[test]
    fn pascal_case_rules() {
        assert!(check_pascal_case("DobotMagician").is_ok());
        assert_eq!(check_pascal_case("dobot"), Err(NameError::NotPascalCase));
        assert_eq!(check_pascal_case("Dobot_M"), Err(NameError::NotPascalCase));
        assert_eq!(check_pascal_case(""), Err(NameError::Empty));
    }

    #[test]
    fn unique_name_rejects_collision() {
        let existing = ["a", "b"];
        assert!(check_unique_name("c", existing.iter().copied()).is_ok());
        assert_eq!(
            check_unique_name("a", existing.iter().copied()),
            Err(NameError::Exists)
        );
    }
}
