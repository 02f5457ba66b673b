use outfitter::{
    DistributionFile, FormIndex, LineKind, NpcOutfitAssignment, OutfitDistribution, ResolutionReport, TargetCategory,
};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// What the terminal view of a report should include.
pub struct View<'a> {
    pub npc: Option<&'a str>,
    pub conflicts_only: bool,
    pub color: bool,
}

impl View<'_> {
    fn shows(&self, assignment: &NpcOutfitAssignment) -> bool {
        if self.conflicts_only && !assignment.has_conflict {
            return false;
        }
        let Some(needle) = self.npc else {
            return true;
        };
        assignment.editor_id.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(needle))
            || needle.parse::<outfitter::FormKey>().is_ok_and(|k| k == assignment.npc)
    }
}

pub fn print_report(report: &ResolutionReport, forms: &FormIndex, view: &View<'_>) {
    let palette = ansi::Palette::new(view.color);
    println!(
        "\n{}",
        palette.bold(palette.paint(
            format!("⚙  Resolved {} NPCs against {} files", report.metrics.npcs, report.metrics.files),
            ansi::CYAN
        ))
    );

    println!("\n{}", palette.paint("━━━ Assignments ━━━", ansi::GRAY));
    let shown: Vec<&NpcOutfitAssignment> = report.assignments.iter().filter(|a| view.shows(a)).collect();
    if shown.is_empty() {
        println!("{}", palette.dim("  No matching NPCs"));
        if report.assignments.is_empty() && !report.unresolved.is_empty() {
            println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
            println!("  • Every entry carries filters that could not be resolved (see below)");
            println!("  • The snapshot does not contain the NPCs the rules target");
        }
    }
    for assignment in &shown {
        print_assignment(assignment, forms, &palette);
    }

    println!("\n{}", palette.paint("━━━ Targets ━━━", ansi::GRAY));
    print_stats(report, forms, &palette);

    if !report.unresolved.is_empty() {
        println!("\n{}", palette.paint("━━━ Needs Review ━━━", ansi::GRAY));
        for u in &report.unresolved {
            let raw: Vec<&str> = [u.raw_string_filters.as_deref(), u.raw_form_filters.as_deref()].into_iter().flatten().collect();
            println!(
                "  {} {} {}",
                palette.paint(format!("{}:{}", u.file_name, u.line_number), ansi::BLUE),
                palette.paint(u.target.label(forms), ansi::CYAN),
                palette.dim(format!("│ {}", raw.join(" | "))),
            );
        }
    }

    let m = &report.metrics;
    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Compile: {}  │  Matching: {}  │  Aggregate: {}",
        palette.paint(format!("{:?}", m.total), ansi::GREEN),
        palette.paint(format!("{:?}", m.compile), ansi::CYAN),
        palette.paint(format!("{:?}", m.matching), ansi::CYAN),
        palette.dim(format!("{:?}", m.aggregate)),
    );
    println!(
        "  {}",
        palette.dim(format!(
            "entries: {}  unresolved: {}  pairs: {}  matches: {}  batches: {}",
            m.entries, m.unresolved_entries, m.pairs_evaluated, m.matches, m.batches
        ))
    );
    println!();
}

fn print_assignment(assignment: &NpcOutfitAssignment, forms: &FormIndex, palette: &ansi::Palette) {
    let outfit = match &assignment.final_outfit {
        Some(key) => palette.bold(palette.paint(forms.display_name(key), ansi::GREEN)),
        None => palette.dim("(default outfit)"),
    };
    let conflict = if assignment.has_conflict { palette.paint("⚠ conflict", ansi::RED) } else { String::new() };
    println!(
        "  {} {} {} {} {}",
        palette.bold(assignment.label()),
        palette.dim(assignment.npc.to_string()),
        palette.dim("→"),
        outfit,
        conflict
    );

    for category in TargetCategory::ALL {
        for d in assignment.distributions_for(category) {
            println!("      {}", fmt_distribution(d, palette));
        }
    }
}

fn fmt_distribution(d: &OutfitDistribution, palette: &ansi::Palette) -> String {
    let marker = if d.is_winner { palette.paint("✓", ansi::GREEN) } else { palette.dim("·") };
    let chance = d.chance.map(|c| palette.paint(format!(" {c}%"), ansi::YELLOW)).unwrap_or_default();
    format!(
        "{} {} {}{} {}",
        marker,
        palette.paint(format!("{} {}:{}", d.dialect.as_str(), d.file_name, d.line_number), ansi::BLUE),
        palette.paint(&d.target_label, ansi::CYAN),
        chance,
        palette.dim(format!("│ {}", d.targeting_description)),
    )
}

fn print_stats(report: &ResolutionReport, forms: &FormIndex, palette: &ansi::Palette) {
    let stats = &report.stats;
    if stats.per_target_actor_counts.is_empty() {
        println!("{}", palette.dim("  No targets distributed"));
        return;
    }
    for (target, actors) in &stats.per_target_actor_counts {
        let state = if stats.is_unchanged(target) { palette.dim("unchanged") } else { palette.paint("changed", ansi::GREEN) };
        println!(
            "  {} {} {}",
            palette.paint(target.label(forms), ansi::CYAN),
            palette.paint(format!("{actors} NPCs"), ansi::YELLOW),
            state
        );
    }
}

pub fn print_files(files: &[DistributionFile], failures: &[(String, String)], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  {} rule files", files.len()), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Files (load order) ━━━", ansi::GRAY));
    if files.is_empty() {
        println!("{}", palette.dim("  No rule files found"));
    }
    for (idx, file) in files.iter().enumerate() {
        println!(
            "  {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            palette.bold(file.relative_path()),
            palette.paint(file.dialect().as_str(), ansi::BLUE),
        );
        let malformed = file.malformed_line_count();
        println!(
            "      {} {}  {} {}  {} {}  {} {}{}",
            palette.dim("outfits:"),
            palette.paint(file.outfit_distribution_count().to_string(), ansi::GREEN),
            palette.dim("keywords:"),
            palette.paint(file.keyword_distribution_count().to_string(), ansi::GREEN),
            palette.dim("rules:"),
            file.count_lines(LineKind::KeyValue),
            palette.dim("comments:"),
            file.count_lines(LineKind::Comment),
            if malformed > 0 { palette.paint(format!("  malformed: {malformed}"), ansi::RED) } else { String::new() },
        );
        if file.uses_chance() {
            println!("      {}", palette.paint("uses chance", ansi::YELLOW));
        }
    }

    if !failures.is_empty() {
        println!("\n{}", palette.paint("━━━ Unreadable ━━━", ansi::GRAY));
        for (path, error) in failures {
            println!("  {} {}", palette.paint(path, ansi::RED), palette.dim(error));
        }
    }
    println!();
}
