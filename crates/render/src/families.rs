use courier_source::{Row, Value};
use hashbrown::HashMap;

use crate::{Recipient, Render, RenderError, Template};

const DEFAULT_GROUP_COLUMN: &str = "family_id";

/// Placeholder resolved once per member, after the shared fields are filled.
const RECEIVER: &str = "receiver";
const PARENTS_TABLE: &str = "parents_table";
const CHILDREN_TABLE: &str = "children_table";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    first_name: String,
    last_name: String,
    email: String,
    subject: String,
    college: String,
}

#[derive(Debug, Default)]
struct Family {
    parents: Vec<Member>,
    children: Vec<Member>,
}

/// Column positions the grouped renderer reads.
struct Layout {
    group: usize,
    first_name: usize,
    last_name: usize,
    email: usize,
    subject: usize,
    college: usize,
    member: usize,
}

impl Layout {
    fn new(columns: &[String], group_column: &str) -> Result<Self, RenderError> {
        let find = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| RenderError::MissingColumn(name.to_owned()))
        };

        Ok(Self {
            group: find(group_column)?,
            first_name: find("first_name")?,
            last_name: find("last_name")?,
            email: find("email")?,
            subject: find("subject")?,
            college: find("college")?,
            member: find("member")?,
        })
    }
}

/// Grouped renderer: rows sharing a group id form one family of parents
/// and children. Everyone in a family gets the same body listing all
/// members, personalised only by the `{receiver}` greeting.
#[derive(Debug, Clone)]
pub struct Families {
    group_column: String,
}

impl Families {
    pub fn new(group_column: Option<&str>) -> Self {
        Self {
            group_column: group_column.unwrap_or(DEFAULT_GROUP_COLUMN).to_owned(),
        }
    }

    fn partition(
        &self,
        rows: &[Row],
        columns: &[String],
    ) -> Result<Vec<Family>, RenderError> {
        let layout = Layout::new(columns, &self.group_column)?;

        let mut families: Vec<Family> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (n, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(RenderError::RowShape {
                    row: n,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            let text = |i: usize| row[i].to_string();
            let member = Member {
                first_name: text(layout.first_name),
                last_name: text(layout.last_name),
                email: text(layout.email),
                subject: text(layout.subject),
                college: text(layout.college),
            };
            if member.email.trim().is_empty() {
                return Err(RenderError::MissingAddress { row: n });
            }

            let key = group_key(&row[layout.group]);
            let slot = *index.entry(key).or_insert_with(|| {
                families.push(Family::default());
                families.len() - 1
            });

            match row[layout.member].as_text() {
                Some("parent") => families[slot].parents.push(member),
                Some("child") => families[slot].children.push(member),
                _ => {
                    return Err(RenderError::UnknownRole {
                        row: n,
                        role: row[layout.member].to_string(),
                    });
                }
            }
        }

        Ok(families)
    }
}

impl Render for Families {
    fn name(&self) -> &'static str {
        "families"
    }

    fn group_column(&self) -> Option<&str> {
        Some(&self.group_column)
    }

    fn render(
        &self,
        rows: &[Row],
        columns: &[String],
        template: &str,
    ) -> Result<Vec<Recipient>, RenderError> {
        let template = Template::parse(template)?;
        let families = self.partition(rows, columns)?;

        let mut recipients = Vec::with_capacity(rows.len());
        for family in &families {
            let parents_table = member_table(&family.parents, true);
            let children_table = member_table(&family.children, false);

            let shared = template.render_partial(
                |name| match name {
                    PARENTS_TABLE => Some(parents_table.clone()),
                    CHILDREN_TABLE => Some(children_table.clone()),
                    _ => None,
                },
                &[RECEIVER],
            )?;
            let shared = Template::parse(&shared)?;

            for member in family.parents.iter().chain(&family.children) {
                let body = shared.render(|name| {
                    (name == RECEIVER).then(|| member.first_name.clone())
                })?;
                recipients.push(Recipient {
                    address: member.email.clone(),
                    body,
                });
            }
        }

        Ok(recipients)
    }
}

/// Group ids are compared by their rendered text, so `7` and `'7'` match.
fn group_key(value: &Value) -> String {
    value.to_string()
}

fn member_table(members: &[Member], bold: bool) -> String {
    let (open, close) = if bold { ("<b>", "</b>") } else { ("", "") };

    members
        .iter()
        .map(|m| {
            format!(
                "<tr>\n\
                 <td>{open}{} {}{close}</td>\n\
                 <td>{open}{}{close}</td>\n\
                 <td>{open}{}{close}</td>\n\
                 <td>{open}{}{close}</td>\n\
                 </tr>",
                m.first_name, m.last_name, m.email, m.subject, m.college
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "families_tests.rs"]
mod tests;
