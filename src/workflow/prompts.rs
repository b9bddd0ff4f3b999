use crate::domain::chunk::{Chunk, ChunkSummary};
use crate::domain::commit::{CommitStyle, CommitType};

fn commit_guidance(style: &CommitStyle) -> String {
    let mut guidance = format!("Write the commit message in {}.\n", style.language);
    if style.conventional {
        let types = CommitType::all()
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        guidance.push_str(&format!(
            "Use the Conventional Commits format `type(scope): subject` with one of: {types}.\n\
             Use `fix` for bug fixes, `feat` for new functionality, `refactor` for restructuring \
             without behavior change and `chore` when nothing else fits.\n"
        ));
    }
    guidance.push_str(
        "Keep the subject line under 72 characters, then a blank line and an optional short \
         body of bullet points. Reply with the commit message only.\n",
    );
    guidance
}

pub fn direct_prompt(rendered_changes: &str, style: &CommitStyle) -> String {
    format!(
        "You are writing a git commit message for the following changes.\n{}\n\
         --- CHANGES ---\n{rendered_changes}--- END CHANGES ---\n",
        commit_guidance(style)
    )
}

pub fn chunk_prompt(chunk: &Chunk, total_chunks: usize, style: &CommitStyle) -> String {
    let scope = match &chunk.part {
        Some(part) => format!(
            "This is part {} of {} of the diff for `{}`; describe only what this part changes.",
            part.part, part.total, part.path
        ),
        None => format!("Files in this chunk: {}.", chunk.paths.join(", ")),
    };
    format!(
        "Summarize the following code changes (chunk {} of {total_chunks}) in {}.\n{scope}\n\
         Focus on what changed and why it matters. Preserve file, function and type names \
         verbatim. Use at most five short bullet points and do not write a commit header.\n\
         --- CHANGES ---\n{}--- END CHANGES ---\n",
        chunk.index + 1,
        style.language,
        chunk.content
    )
}

/// Groups summaries sharing a label (parts of one file) under one heading,
/// in order of first appearance.
fn grouped_summaries(summaries: &[ChunkSummary]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for summary in summaries {
        let key = summary
            .label
            .split(" (part ")
            .next()
            .unwrap_or(summary.label.as_str());
        match groups.iter_mut().find(|(label, _)| *label == key) {
            Some((_, items)) => items.push(summary.summary.trim()),
            None => groups.push((key, vec![summary.summary.trim()])),
        }
    }

    let mut out = String::new();
    for (label, items) in groups {
        out.push_str(&format!("## {label}\n"));
        for item in items {
            out.push_str(item);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

pub fn final_merge_prompt(summaries: &[ChunkSummary], style: &CommitStyle) -> String {
    format!(
        "The summaries below describe parts of one change set. Combine them into a single \
         commit message that covers the whole change. Lead with the most significant change \
         and merge duplicates.\n{}\n--- SUMMARIES ---\n{}--- END SUMMARIES ---\n",
        commit_guidance(style),
        grouped_summaries(summaries)
    )
}

pub fn group_merge_prompt(summaries: &[ChunkSummary], language: &str) -> String {
    format!(
        "Condense the following change summaries into one shorter summary in {language}. \
         Keep every distinct change, drop repetition and preserve identifiers verbatim. \
         Use bullet points and do not write a commit header.\n\
         --- SUMMARIES ---\n{}--- END SUMMARIES ---\n",
        grouped_summaries(summaries)
    )
}

pub fn filter_prompt(paths: &[&str]) -> String {
    let listing = paths
        .iter()
        .map(|path| format!("- {path}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Classify each changed file path as \"core\" (meaningful source, configuration or \
         documentation) or \"ignorable\" (lockfiles, build artifacts, generated code, minified \
         bundles, vendored dependencies). When unsure, choose core.\n\
         Reply with JSON only, shaped as {{\"core\": [paths], \"ignorable\": [paths]}}.\n\
         --- FILES ---\n{listing}\n--- END FILES ---\n"
    )
}
