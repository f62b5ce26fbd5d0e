use crate::cli::{AliasAction, SetAction, SetArgs};
use crate::config::{Alias, Config};

pub fn exec(args: SetArgs) -> anyhow::Result<()> {
    match args.action {
        Some(SetAction::Alias { action }) => exec_alias(action),
        None => exec_keys(args.key, args.value),
    }
}

fn exec_keys(key: Option<String>, value: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let Some(key) = key else {
        println!("email: {}", config.email);
        println!("months: {}", config.months);
        print_aliases(&config.aliases, "aliases: (none)");
        return Ok(());
    };
    let Some(value) = value else {
        anyhow::bail!("usage: commitmap set [email|months] <value>");
    };

    match key.as_str() {
        "email" => config.email = value,
        "months" => {
            let months: u32 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid months {value:?}"))?;
            if months == 0 {
                anyhow::bail!("months must be > 0");
            }
            config.months = months;
        }
        other => anyhow::bail!("unsupported key {other:?} (supported: email, months)"),
    }

    config.save()?;
    Ok(())
}

fn exec_alias(action: AliasAction) -> anyhow::Result<()> {
    match action {
        AliasAction::Add { name, emails } => {
            let (name, emails) = normalize_alias_input(&name, &emails)?;

            let mut config = Config::load()?;
            check_alias_email_conflicts(&config.aliases, &name, &emails)?;

            let alias = Alias {
                name: name.clone(),
                emails: emails.clone(),
            };
            match find_alias_index(&config.aliases, &name) {
                Some(index) => config.aliases[index] = alias,
                None => config.aliases.push(alias),
            }
            config.save()?;

            println!("alias {name:?} saved: {}", emails.join(", "));
            Ok(())
        }
        AliasAction::Remove { name } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                anyhow::bail!("alias name cannot be empty");
            }

            let mut config = Config::load()?;
            let Some(index) = find_alias_index(&config.aliases, &name) else {
                anyhow::bail!("alias {name:?} not found");
            };
            config.aliases.remove(index);
            config.save()?;

            println!("alias {name:?} removed");
            Ok(())
        }
        AliasAction::List => {
            let config = Config::load()?;
            print_aliases(&config.aliases, "No aliases configured");
            Ok(())
        }
    }
}

fn print_aliases(aliases: &[Alias], empty_msg: &str) {
    if aliases.is_empty() {
        println!("{empty_msg}");
        return;
    }

    println!("aliases:");
    for alias in aliases {
        let emails: Vec<&str> = alias
            .emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();
        println!("  {}: {}", alias.name.trim(), emails.join(", "));
    }
}

/// Trim the name and emails, require `@`, and drop case-insensitive
/// duplicates while keeping order (the first email stays primary).
fn normalize_alias_input(name: &str, emails: &[String]) -> anyhow::Result<(String, Vec<String>)> {
    let name = name.trim().to_string();
    if name.is_empty() {
        anyhow::bail!("alias name cannot be empty");
    }

    let mut normalized = Vec::with_capacity(emails.len());
    let mut seen = std::collections::HashSet::new();
    for email in emails {
        let trimmed = email.trim();
        if trimmed.is_empty() {
            anyhow::bail!("alias email cannot be empty");
        }
        if !trimmed.contains('@') {
            anyhow::bail!("invalid email format {trimmed:?}: must contain @");
        }
        if seen.insert(trimmed.to_lowercase()) {
            normalized.push(trimmed.to_string());
        }
    }

    if normalized.is_empty() {
        anyhow::bail!("at least one email is required");
    }
    Ok((name, normalized))
}

/// An email may belong to only one alias group; updating a group with its
/// own emails is not a conflict.
fn check_alias_email_conflicts(
    aliases: &[Alias],
    name: &str,
    emails: &[String],
) -> anyhow::Result<()> {
    let mut owners = std::collections::HashMap::new();
    for alias in aliases {
        if alias.name.eq_ignore_ascii_case(name) {
            continue;
        }
        for existing in &alias.emails {
            let key = existing.trim().to_lowercase();
            if !key.is_empty() {
                owners.insert(key, alias.name.clone());
            }
        }
    }

    for email in emails {
        if let Some(owner) = owners.get(&email.trim().to_lowercase()) {
            anyhow::bail!("email {email:?} already belongs to alias {owner:?}");
        }
    }
    Ok(())
}

fn find_alias_index(aliases: &[Alias], name: &str) -> Option<usize> {
    aliases
        .iter()
        .position(|alias| alias.name.eq_ignore_ascii_case(name))
}
