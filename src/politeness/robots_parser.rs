use robotstxt::DefaultMatcher;

/// Parsed robots.txt data: allow/disallow matching is delegated to the
/// `robotstxt` crate; crawl-delay extraction is hand-rolled below since that
/// crate exposes no first-class accessor for the directive.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    allow_all: bool,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    pub fn raw_content(&self) -> &str {
        &self.content
    }

    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, path)
    }

    /// Scans the raw body for `Crawl-delay:` lines, preferring the group
    /// whose `User-agent:` line matches `user_agent` exactly (case
    /// insensitive) over the wildcard `*` group. Returns `None` if no group
    /// specifies a (parsable) delay.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.content.is_empty() {
            return None;
        }

        let groups = split_into_groups(&self.content);

        let exact = groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a.eq_ignore_ascii_case(user_agent)))
            .and_then(|g| g.crawl_delay);
        if exact.is_some() {
            return exact;
        }

        groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a == "*"))
            .and_then(|g| g.crawl_delay)
    }
}

struct Group {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Splits a robots.txt body into `User-agent:` groups, each carrying the
/// agent tokens that introduced it and any `Crawl-delay:` value found
/// before the next `User-agent:` block begins a new group.
fn split_into_groups(content: &str) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut current_delay: Option<f64> = None;
    let mut in_agent_block = false;

    for raw_line in content.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_ascii_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => {
                if !in_agent_block {
                    // starting a fresh group
                    current_agents.clear();
                    current_delay = None;
                }
                current_agents.push(value.to_string());
                in_agent_block = true;
            }
            "crawl-delay" => {
                if let Ok(seconds) = value.parse::<f64>() {
                    current_delay = Some(seconds);
                }
                in_agent_block = false;
            }
            _ => {
                in_agent_block = false;
                if !current_agents.is_empty() {
                    groups.push(Group {
                        agents: std::mem::take(&mut current_agents),
                        crawl_delay: current_delay.take(),
                    });
                }
            }
        }
    }

    if !current_agents.is_empty() {
        groups.push(Group {
            agents: current_agents,
            crawl_delay: current_delay,
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/any/path", "TestBot"));
    }

    #[test]
    fn test_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("/", "TestBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 5\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("TestBot"), Some(5.0));
    }

    #[test]
    fn test_crawl_delay_prefers_exact_agent() {
        let content = "User-agent: TestBot\nCrawl-delay: 10\n\nUser-agent: *\nCrawl-delay: 2";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("TestBot"), Some(10.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(2.0));
    }

    #[test]
    fn test_crawl_delay_absent_is_none() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_crawl_delay_fractional() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 0.5");
        assert_eq!(robots.crawl_delay("TestBot"), Some(0.5));
    }
}
