use super::error::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    RollNo,
    FullName,
    ClassName,
    Section,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::RollNo,
        Field::FullName,
        Field::ClassName,
        Field::Section,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::RollNo => "roll number",
            Field::FullName => "name",
            Field::ClassName => "class",
            Field::Section => "section",
        }
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            Field::RollNo => key.contains("roll") || matches!(key, "rno" | "rn"),
            Field::FullName => key.contains("name") || key.contains("student"),
            Field::ClassName => {
                matches!(key, "class" | "classname" | "grade" | "std" | "standard")
                    || numbered(key, "class")
                    || numbered(key, "grade")
            }
            Field::Section => {
                key.contains("section") || matches!(key, "sec" | "division" | "div")
            }
        }
    }
}

// "class1", "grade10" and the like.
fn numbered(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Lowercase, ASCII alphanumerics only: "Roll No.", "roll_no" and
/// "ROLL NO" all become "rollno".
pub fn normalize_header(h: &str) -> String {
    h.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Column index for each of the four roster fields, resolved once per import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPlan {
    pub roll_no: usize,
    pub full_name: usize,
    pub class_name: usize,
    pub section: usize,
}

impl ColumnPlan {
    pub fn resolve(header: &[String]) -> Result<ColumnPlan, ImportError> {
        let keys = header.iter().map(|h| normalize_header(h)).collect::<Vec<_>>();
        let mut claimed = vec![false; keys.len()];
        let mut found: [Option<usize>; 4] = [None; 4];

        for (slot, field) in Field::ALL.iter().enumerate() {
            let hit = keys
                .iter()
                .enumerate()
                .find(|(i, k)| !claimed[*i] && !k.is_empty() && field.matches(k))
                .map(|(i, _)| i);
            if let Some(i) = hit {
                claimed[i] = true;
                found[slot] = Some(i);
            }
        }

        match found {
            [Some(roll_no), Some(full_name), Some(class_name), Some(section)] => Ok(ColumnPlan {
                roll_no,
                full_name,
                class_name,
                section,
            }),
            _ => Err(ImportError::MissingColumns {
                missing: Field::ALL
                    .iter()
                    .zip(found.iter())
                    .filter(|(_, idx)| idx.is_none())
                    .map(|(f, _)| *f)
                    .collect(),
            }),
        }
    }

    pub fn column(&self, field: Field) -> usize {
        match field {
            Field::RollNo => self.roll_no,
            Field::FullName => self.full_name,
            Field::ClassName => self.class_name,
            Field::Section => self.section,
        }
    }
}
