//! Per-entity element builders
//!
//! Each builder is a pure function from a record to an ordered sequence of
//! markup [`Instruction`]s. No builder touches the sink; that separation is
//! what keeps the markup logic unit-testable without any I/O.

use crate::errors::RecordFormatError;
use crate::models::{Program, Station};
use crate::xmltv::time::{compute_stop, format_date, format_timestamp};

/// One step of markup emission.
///
/// Element and attribute names are fixed by the XMLTV schema, so they are
/// `&'static str`; only attribute values and text content are owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Open a nested scope, e.g. `<channel id="...">`
    Open {
        name: &'static str,
        attrs: Vec<(&'static str, String)>,
    },
    /// Write text content inside the current scope
    Text(String),
    /// Close the most recently opened scope
    Close,
    /// Emit a self-closing element, e.g. `<icon src="..."/>`
    SelfClosing {
        name: &'static str,
        attrs: Vec<(&'static str, String)>,
    },
}

impl Instruction {
    fn open(name: &'static str) -> Self {
        Instruction::Open {
            name,
            attrs: Vec::new(),
        }
    }

    fn open_with(name: &'static str, attrs: Vec<(&'static str, String)>) -> Self {
        Instruction::Open { name, attrs }
    }

    fn text(value: impl Into<String>) -> Self {
        Instruction::Text(value.into())
    }
}

/// Build the markup for one `channel` element.
///
/// ```text
/// <channel id="STATION_ID">
///   <display-name>STATION NAME</display-name>
///   <icon src="LOGO_URL"/>   (only when the station has a logo)
/// </channel>
/// ```
pub fn build_channel(station: &Station) -> Vec<Instruction> {
    let mut out = vec![
        Instruction::open_with("channel", vec![("id", station.id.clone())]),
        Instruction::open("display-name"),
        Instruction::text(&station.name),
        Instruction::Close,
    ];
    if let Some(logo) = &station.logo {
        out.push(Instruction::SelfClosing {
            name: "icon",
            attrs: vec![("src", logo.clone())],
        });
    }
    out.push(Instruction::Close);
    out
}

/// Build the markup for one `programme` element.
///
/// Child order is fixed: title, sub-title, desc, credits, category*, date.
/// Optional fields that are absent produce no element at all, never an empty
/// one. Timestamp derivation failures are tagged with the record's identity
/// and abort the run.
pub fn build_programme(program: &Program) -> Result<Vec<Instruction>, RecordFormatError> {
    let tag = |source| RecordFormatError {
        program_id: program.id.clone(),
        channel_id: program.station_id.clone(),
        source,
    };

    let start = format_timestamp(program.schedule.airdatetime).map_err(&tag)?;
    let stop = compute_stop(program.schedule.airdatetime, program.schedule.duration)
        .and_then(format_timestamp)
        .map_err(&tag)?;

    let mut out = vec![
        Instruction::open_with(
            "programme",
            vec![
                ("start", start),
                ("stop", stop),
                ("duration", program.schedule.duration.to_string()),
                ("channel", program.station_id.clone()),
            ],
        ),
        Instruction::open("title"),
        Instruction::text(&program.title),
        Instruction::Close,
    ];

    if let Some(subtitle) = &program.subtitle {
        out.push(Instruction::open_with(
            "sub-title",
            vec![("lang", "en".to_string())],
        ));
        out.push(Instruction::text(subtitle));
        out.push(Instruction::Close);
    }

    if let Some(description) = &program.description {
        out.push(Instruction::open_with(
            "desc",
            vec![("lang", "en".to_string())],
        ));
        out.push(Instruction::text(description));
        out.push(Instruction::Close);
    }

    if !program.actors.is_empty() {
        out.push(Instruction::open("credits"));
        for actor in &program.actors {
            out.push(Instruction::open("actor"));
            out.push(Instruction::text(&actor.name));
            out.push(Instruction::Close);
        }
        out.push(Instruction::Close);
    }

    for genre in &program.genres {
        out.push(Instruction::open_with(
            "category",
            vec![("lang", "en".to_string())],
        ));
        out.push(Instruction::text(genre));
        out.push(Instruction::Close);
    }

    if let Some(airdate) = program.orig_airdate {
        out.push(Instruction::open("date"));
        out.push(Instruction::text(format_date(airdate).map_err(&tag)?));
        out.push(Instruction::Close);
    }

    out.push(Instruction::Close);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, Airing};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn station(logo: Option<&str>) -> Station {
        Station {
            id: "5.1".to_string(),
            name: "KTTV".to_string(),
            logo: logo.map(str::to_string),
        }
    }

    fn bare_program() -> Program {
        Program {
            id: "SH000001".to_string(),
            title: "News".to_string(),
            subtitle: None,
            description: None,
            actors: Vec::new(),
            genres: Vec::new(),
            orig_airdate: None,
            schedule: Airing {
                airdatetime: Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap(),
                duration: 1800,
            },
            station_id: "5.1".to_string(),
        }
    }

    fn count_scope_balance(instructions: &[Instruction]) -> i64 {
        instructions.iter().fold(0, |acc, i| match i {
            Instruction::Open { .. } => acc + 1,
            Instruction::Close => acc - 1,
            _ => acc,
        })
    }

    #[test]
    fn channel_without_logo_has_no_icon() {
        let instructions = build_channel(&station(None));
        assert!(!instructions
            .iter()
            .any(|i| matches!(i, Instruction::SelfClosing { name: "icon", .. })));
        assert_eq!(count_scope_balance(&instructions), 0);
    }

    #[test]
    fn channel_with_logo_has_exactly_one_icon() {
        let instructions = build_channel(&station(Some("https://example.com/kttv.png")));
        let icons: Vec<_> = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::SelfClosing { name: "icon", .. }))
            .collect();
        assert_eq!(icons.len(), 1);
        assert_eq!(
            icons[0],
            &Instruction::SelfClosing {
                name: "icon",
                attrs: vec![("src", "https://example.com/kttv.png".to_string())],
            }
        );
    }

    #[test]
    fn bare_programme_is_title_only() {
        let instructions = build_programme(&bare_program()).unwrap();
        assert_eq!(
            instructions,
            vec![
                Instruction::Open {
                    name: "programme",
                    attrs: vec![
                        ("start", "20240101180000".to_string()),
                        ("stop", "20240101183000".to_string()),
                        ("duration", "1800".to_string()),
                        ("channel", "5.1".to_string()),
                    ],
                },
                Instruction::open("title"),
                Instruction::Text("News".to_string()),
                Instruction::Close,
                Instruction::Close,
            ]
        );
    }

    #[test]
    fn genres_yield_one_category_each_in_order() {
        let mut program = bare_program();
        program.genres = vec!["News".to_string(), "Local".to_string()];
        let instructions = build_programme(&program).unwrap();

        let categories: Vec<_> = instructions
            .windows(2)
            .filter_map(|w| match (&w[0], &w[1]) {
                (Instruction::Open { name: "category", attrs }, Instruction::Text(text)) => {
                    Some((attrs.clone(), text.clone()))
                }
                _ => None,
            })
            .collect();

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].1, "News");
        assert_eq!(categories[1].1, "Local");
        for (attrs, _) in categories {
            assert_eq!(attrs, vec![("lang", "en".to_string())]);
        }
    }

    #[test]
    fn credits_present_iff_actors_nonempty() {
        let instructions = build_programme(&bare_program()).unwrap();
        assert!(!instructions
            .iter()
            .any(|i| matches!(i, Instruction::Open { name: "credits", .. })));

        let mut program = bare_program();
        program.actors = vec![
            Actor {
                name: "Lauren Graham".to_string(),
            },
            Actor {
                name: "Alexis Bledel".to_string(),
            },
        ];
        let instructions = build_programme(&program).unwrap();
        let actor_names: Vec<_> = instructions
            .windows(2)
            .filter_map(|w| match (&w[0], &w[1]) {
                (Instruction::Open { name: "actor", .. }, Instruction::Text(text)) => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(actor_names, vec!["Lauren Graham", "Alexis Bledel"]);
    }

    #[test]
    fn child_order_is_stable() {
        let mut program = bare_program();
        program.subtitle = Some("Evening Edition".to_string());
        program.description = Some("Local news.".to_string());
        program.actors = vec![Actor {
            name: "Anchor One".to_string(),
        }];
        program.genres = vec!["News".to_string()];
        program.orig_airdate = NaiveDate::from_ymd_opt(2023, 12, 31);

        let instructions = build_programme(&program).unwrap();
        let opens: Vec<&str> = instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Open { name, .. } => Some(*name),
                _ => None,
            })
            .collect();
        assert_eq!(
            opens,
            vec![
                "programme",
                "title",
                "sub-title",
                "desc",
                "credits",
                "actor",
                "category",
                "date"
            ]
        );
        assert_eq!(count_scope_balance(&instructions), 0);
    }

    #[test]
    fn derivation_failure_names_the_record() {
        let mut program = bare_program();
        program.schedule.airdatetime = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 0).unwrap();
        program.schedule.duration = 3600;

        let err = build_programme(&program).unwrap_err();
        assert_eq!(err.program_id, "SH000001");
        assert_eq!(err.channel_id, "5.1");
    }
}
