//! Symbol keys and the comma-separated record format they are written in.

use std::fmt;

const SEPARATOR: char = ',';
const QUOTE: char = '"';

/// An API symbol: a type, or a member of a type.
///
/// The serialised form is `package,Type,` for types and
/// `package,Type,member` for members. A field containing the separator or a
/// quote is wrapped in quotes with inner quotes doubled, so
/// `pkg,Owner,"m(a,b)"` and `pkg,Owner,m(a` never collide.
///
/// Keys are only built through [`SymbolKey::of_type`] and
/// [`SymbolKey::of_member`]; a member key always has a non-empty member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey(Symbol);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Symbol {
    Type {
        package: String,
        name: String,
    },
    Member {
        package: String,
        owner: String,
        member: String,
    },
}

impl SymbolKey {
    pub fn of_type(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self(Symbol::Type {
            package: package.into(),
            name: name.into(),
        })
    }

    /// A member key; an empty member denotes the owning type itself.
    pub fn of_member(
        package: impl Into<String>,
        owner: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        let member = member.into();
        if member.is_empty() {
            return Self::of_type(package, owner);
        }
        Self(Symbol::Member {
            package: package.into(),
            owner: owner.into(),
            member,
        })
    }

    pub fn package(&self) -> &str {
        match &self.0 {
            Symbol::Type { package, .. } | Symbol::Member { package, .. } => package,
        }
    }

    /// The type itself, or the type owning the member.
    pub fn owner(&self) -> &str {
        match &self.0 {
            Symbol::Type { name, .. } => name,
            Symbol::Member { owner, .. } => owner,
        }
    }

    pub fn member(&self) -> Option<&str> {
        match &self.0 {
            Symbol::Type { .. } => None,
            Symbol::Member { member, .. } => Some(member),
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self.0, Symbol::Type { .. })
    }

    /// Key of one usage-report record: `package,type,member,frequency`.
    ///
    /// The trailing frequency is ignored; records with fewer than three
    /// fields are not symbol usages.
    pub fn from_usage_record(line: &str) -> Option<Self> {
        let mut fields = split_record(line)?;
        if fields.len() < 3 {
            return None;
        }
        fields.pop();
        let mut fields = fields.into_iter();
        let package = fields.next()?;
        let owner = fields.next()?;
        let member = fields.next().unwrap_or_default();
        if fields.next().is_some() {
            return None;
        }
        Some(Self::of_member(package, owner, member))
    }

    /// Serialised form without the trailing separator of type keys.
    pub fn trimmed(&self) -> String {
        let mut key = self.to_string();
        if self.is_type() {
            key.pop();
        }
        key
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_field(f, self.package())?;
        f.write_str(",")?;
        write_field(f, self.owner())?;
        f.write_str(",")?;
        match self.member() {
            Some(member) => write_field(f, member),
            None => Ok(()),
        }
    }
}

fn needs_quoting(field: &str) -> bool {
    field.contains([SEPARATOR, QUOTE, '\n', '\r'])
}

fn write_field(f: &mut fmt::Formatter<'_>, field: &str) -> fmt::Result {
    if !needs_quoting(field) {
        return f.write_str(field);
    }
    f.write_str("\"")?;
    f.write_str(&field.replace(QUOTE, "\"\""))?;
    f.write_str("\"")
}

/// Split one record into fields, honouring quotes. `None` on an unterminated quote.
pub fn split_record(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            QUOTE if quoted => {
                if chars.peek() == Some(&QUOTE) {
                    chars.next();
                    field.push(QUOTE);
                } else {
                    quoted = false;
                }
            }
            QUOTE if field.is_empty() => quoted = true,
            SEPARATOR if !quoted => fields.push(std::mem::take(&mut field)),
            other => field.push(other),
        }
    }
    if quoted {
        return None;
    }
    fields.push(field);
    Some(fields)
}
