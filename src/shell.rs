//! Line-oriented inspection shell over a preprocessed oracle.

use crate::error::{OracleError, Result};
use crate::oracle::TZOracle;
use crate::topology::{Asn, Route};
use std::fmt::Write as _;

/// Keywords with their argument counts, in the order `help` lists them.
pub const COMMANDS: &[(&str, usize, &str)] = &[
    ("route", 2, "approximate route between two ASes"),
    ("bunch", 1, "landmarks in the bunch of an AS"),
    ("witness", 2, "witness of an AS at a level: witness <level> <asn>"),
    ("delete", 2, "delete a link and repair the tables"),
    ("test-link", 2, "relationship between two ASes"),
    ("links", 0, "number of links in the topology"),
    ("help", 0, "list commands"),
    ("exit", 0, "leave the shell"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Route(Asn, Asn),
    Bunch(Asn),
    Witness { level: usize, asn: Asn },
    Delete(Asn, Asn),
    TestLink(Asn, Asn),
    Links,
    Help,
    Exit,
}

fn number<T: std::str::FromStr>(token: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| OracleError::Shell(format!("'{}' is not a valid number", token)))
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&keyword, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let arity = COMMANDS
            .iter()
            .find(|(name, _, _)| *name == keyword)
            .map(|(_, arity, _)| *arity)
            .ok_or_else(|| OracleError::Shell(format!("unknown command '{}'", keyword)))?;
        if args.len() != arity {
            return Err(OracleError::Shell(format!(
                "{} takes {} argument(s), got {}",
                keyword.to_uppercase(),
                arity,
                args.len()
            )));
        }

        let command = match keyword {
            "route" => Command::Route(number(args[0])?, number(args[1])?),
            "bunch" => Command::Bunch(number(args[0])?),
            "witness" => Command::Witness {
                level: number(args[0])?,
                asn: number(args[1])?,
            },
            "delete" => Command::Delete(number(args[0])?, number(args[1])?),
            "test-link" => Command::TestLink(number(args[0])?, number(args[1])?),
            "links" => Command::Links,
            "help" => Command::Help,
            _ => Command::Exit,
        };
        Ok(Some(command))
    }
}

/// Runs a command and returns the text to print.
pub fn execute(oracle: &mut TZOracle, command: Command) -> Result<String> {
    match command {
        Command::Route(origin, destination) => {
            let (level, nodes) = oracle.approximate_path(origin, destination)?;
            let links = oracle.topology().link_types(&nodes).ok_or_else(|| {
                OracleError::invariant(format!(
                    "route {} -> {} crosses a missing link",
                    origin, destination
                ))
            })?;
            let route = Route { nodes, links };
            Ok(format!(
                "{}\t({} hops, level {})",
                route.render(),
                route.hops(),
                level
            ))
        }
        Command::Bunch(asn) => {
            if !oracle.topology().contains(asn) {
                return Err(OracleError::UnknownNode(asn));
            }
            let mut landmarks: Vec<Asn> = oracle
                .bunch(asn)
                .map(|bunch| bunch.keys().copied().collect())
                .unwrap_or_default();
            landmarks.sort_unstable();
            let listed: Vec<String> = landmarks.iter().map(|l| l.to_string()).collect();
            Ok(format!("Size:{}\t[{}]", landmarks.len(), listed.join(" ")))
        }
        Command::Witness { level, asn } => {
            if level >= oracle.k() {
                return Err(OracleError::Shell(format!(
                    "level {} out of range 0..{}",
                    level,
                    oracle.k()
                )));
            }
            let record = oracle
                .witness(level, asn)
                .ok_or(OracleError::UnknownNode(asn))?;
            if record.is_reachable() {
                Ok(format!(
                    "Level {} witness of {} is {} (distance {}, via {})",
                    level, asn, record.parent, record.distance, record.next_hop
                ))
            } else {
                Ok(format!("Level {} witness of {} is unreachable", level, asn))
            }
        }
        Command::Delete(a, b) => {
            let outcome = oracle.remove_edge(a, b)?;
            let mut out = format!(
                "Deletion {}: {} nodes exchanged updates",
                outcome.status,
                outcome.impacted_nodes.len()
            );
            if !outcome.disconnected_nodes.is_empty() {
                let _ = write!(
                    out,
                    ", {} nodes lost a top-level landmark",
                    outcome.disconnected_nodes.len()
                );
            }
            Ok(out)
        }
        Command::TestLink(a, b) => {
            let topology = oracle.topology();
            if !topology.contains(a) || !topology.contains(b) {
                return Ok("INVALID AS SPECIFIED".to_string());
            }
            Ok(match topology.neighbor_type(a, b) {
                Some(kind) => format!("LINK: #{} {} #{}", a, kind.symbol(), b),
                None => "LINK NOT FOUND".to_string(),
            })
        }
        Command::Links => Ok(format!("{} links", oracle.count_links())),
        Command::Help => {
            let mut out = String::from("The available commands are:");
            for (name, arity, summary) in COMMANDS {
                let _ = write!(out, "\n\t{}\t({} args)\t{}", name, arity, summary);
            }
            Ok(out)
        }
        Command::Exit => Ok("bye".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkHierarchy;
    use crate::oracle::TZConfig;
    use crate::topology::{Relationship, Topology};

    fn oracle() -> TZOracle {
        let mut t = Topology::new();
        t.add_edge(1, 2, Relationship::Customer);
        t.add_edge(1, 3, Relationship::Customer);
        t.add_edge(2, 3, Relationship::Peer);
        t.add_edge(3, 4, Relationship::Customer);
        let hierarchy = LandmarkHierarchy::from_levels(
            &t,
            vec![t.asns().collect(), [1].into_iter().collect()],
        )
        .unwrap();
        let mut tz = TZOracle::new(t, TZConfig { k: 2, seed: 1 });
        tz.set_hierarchy(hierarchy).unwrap();
        tz.preprocess().unwrap();
        tz
    }

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("route 1 4").unwrap(), Some(Command::Route(1, 4)));
        assert_eq!(
            Command::parse("  witness 0   3 ").unwrap(),
            Some(Command::Witness { level: 0, asn: 3 })
        );
        assert_eq!(Command::parse("links").unwrap(), Some(Command::Links));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Exit));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Command::parse("route 1"), Err(OracleError::Shell(_))));
        assert!(matches!(Command::parse("route 1 x"), Err(OracleError::Shell(_))));
        assert!(matches!(Command::parse("fly 1 2"), Err(OracleError::Shell(_))));
        assert!(matches!(Command::parse("help me"), Err(OracleError::Shell(_))));
    }

    #[test]
    fn test_route_and_links() {
        let mut tz = oracle();
        let out = execute(&mut tz, Command::Route(1, 4)).unwrap();
        assert!(out.starts_with("1 v 3 v 4"), "{}", out);
        let (level, _) = tz.approximate_path(1, 4).unwrap();
        let expected = format!("{}\t(2 hops, level {})", tz.get_route(1, 4).unwrap().render(), level);
        assert_eq!(out, expected);
        assert_eq!(execute(&mut tz, Command::Links).unwrap(), "4 links");
        assert!(matches!(
            execute(&mut tz, Command::Route(1, 9)),
            Err(OracleError::UnknownNode(9))
        ));
    }

    #[test]
    fn test_test_link() {
        let mut tz = oracle();
        assert_eq!(execute(&mut tz, Command::TestLink(1, 2)).unwrap(), "LINK: #1 v #2");
        assert_eq!(execute(&mut tz, Command::TestLink(2, 4)).unwrap(), "LINK NOT FOUND");
        assert_eq!(
            execute(&mut tz, Command::TestLink(2, 40)).unwrap(),
            "INVALID AS SPECIFIED"
        );
    }

    #[test]
    fn test_witness_and_bunch() {
        let mut tz = oracle();
        let out = execute(&mut tz, Command::Witness { level: 1, asn: 4 }).unwrap();
        assert_eq!(out, "Level 1 witness of 4 is 1 (distance 2, via 3)");
        assert!(execute(&mut tz, Command::Witness { level: 5, asn: 4 }).is_err());
        let out = execute(&mut tz, Command::Bunch(4)).unwrap();
        assert!(out.starts_with("Size:"));
        assert!(out.contains('1'));
    }

    #[test]
    fn test_delete() {
        let mut tz = oracle();
        let out = execute(&mut tz, Command::Delete(3, 4)).unwrap();
        assert!(out.starts_with("Deletion not-performed"), "{}", out);
        let out = execute(&mut tz, Command::Delete(2, 3)).unwrap();
        assert!(out.starts_with("Deletion repaired"), "{}", out);
        assert_eq!(execute(&mut tz, Command::Links).unwrap(), "3 links");
    }

    #[test]
    fn test_help_lists_every_command() {
        let mut tz = oracle();
        let out = execute(&mut tz, Command::Help).unwrap();
        for (name, _, _) in COMMANDS {
            assert!(out.contains(name));
        }
    }
}
