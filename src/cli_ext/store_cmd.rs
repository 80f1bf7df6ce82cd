//! CLI command handlers for the fragment store.
//!
//! Every mutating command applies one change under the store's
//! exclusive lock and saves it before releasing. `--dry-run` applies
//! the change in memory and prints it instead of saving.

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::{info, instrument};

use crate::cli::{
    AddArgs, AppContext, EditArgs, FolderArgs, FolderSubcommand, FragmentFields, LabelArgs,
    ListArgs, ShowArgs,
};
use crate::core::extract::SelectionTarget;
use crate::core::parametrize::{apply_probe_args, parametrize_target};
use crate::infra::io::read_source;
use crate::infra::line_index::NewlineIndex;
use crate::store::{FileStore, FolderTree, Fragment, FragmentStore};

/// Open the store at the configured (or `--store`) path
pub fn open_store(ctx: &AppContext) -> Result<FileStore>
{
    let path = ctx
        .config
        .store
        .resolved_path()?;

    FileStore::open(&path).with_context(|| format!("Failed to open fragment store {}", path.display()))
}

/// Apply one change under the store lock. The closure describes the
/// change; it is saved unless --dry-run.
fn mutate_store<F>(
    ctx: &AppContext,
    change: F,
) -> Result<()>
where
    F: FnOnce(&mut FileStore) -> Result<String>,
{
    let path = ctx
        .config
        .store
        .resolved_path()?;

    let what = FileStore::update(&path, !ctx.dry_run, change)
        .with_context(|| format!("Failed to update fragment store {}", path.display()))?;

    if ctx.dry_run
    {
        println!("dry run: would {what} in {}", path.display());
    }
    else
    {
        ctx.success(&what);
    }
    Ok(())
}

/// Copy the given fields onto a fragment
fn apply_fields(
    f: &mut Fragment,
    fields: &FragmentFields,
)
{
    let slots: [(&Option<String>, &mut String); 7] = [
        (&fields.body, &mut f.body),
        (&fields.keywords, &mut f.keywords),
        (&fields.scope, &mut f.scope),
        (&fields.domain, &mut f.domain),
        (&fields.tags, &mut f.tags),
        (&fields.prefix, &mut f.prefix),
        (&fields.description, &mut f.description),
    ];

    for (value, slot) in slots
    {
        if let Some(v) = value
        {
            *slot = v.clone();
        }
    }
}

/// Raw text of a `file.py:3-5` selection
fn selection_text(target: &str) -> Result<String>
{
    let target = SelectionTarget::parse(target)?;
    let document = read_source(&target.file)?;
    let lines = NewlineIndex::build(document.as_bytes()).line_count();
    let range = target
        .selection(lines)
        .byte_range(&document)
        .with_context(|| format!("Invalid selection in {}", target.file.display()))?;

    Ok(document[range].to_string())
}

#[instrument(skip(ctx), fields(label = %args.label))]
pub fn add(
    args: AddArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut fragment = Fragment { scope: "python".to_string(), ..Fragment::new(args.label.clone()) };

    // Run the whole pipeline before touching the store
    if let Some(from) = &args.from
    {
        if args.parametrize
        {
            let mut cfg = ctx
                .config
                .clone();
            apply_probe_args(&mut cfg, &args.probe);

            let result = parametrize_target(from, &cfg)?;
            if let Some(warning) = result.warning()
            {
                ctx.warn(&warning);
            }
            fragment.body = result.body;
            fragment.placeholders = result.list;
        }
        else
        {
            fragment.body = selection_text(from)?;
        }
    }
    apply_fields(&mut fragment, &args.fields);

    mutate_store(ctx, |store| {
        if !store.add_fragment(fragment)
        {
            bail!("a fragment or folder labeled `{}` already exists", args.label);
        }

        info!("fragment added");
        Ok(format!("added fragment `{}`", args.label))
    })
}

#[instrument(skip(ctx), fields(label = %args.label))]
pub fn edit(
    args: EditArgs,
    ctx: &AppContext,
) -> Result<()>
{
    mutate_store(ctx, |store| {
        let Some(mut fragment) = store.get(&args.label)
        else
        {
            bail!("no fragment labeled `{}`", args.label);
        };

        apply_fields(&mut fragment, &args.fields);
        if let Some(list) = &args.placeholders
        {
            fragment.placeholders = list.clone();
        }
        for tag in &args.add_tag
        {
            fragment.add_tag(tag);
        }
        for tag in &args.remove_tag
        {
            fragment.remove_tag(tag);
        }

        store.update_fragment(fragment);
        Ok(format!("updated fragment `{}`", args.label))
    })
}

pub fn delete(
    args: LabelArgs,
    ctx: &AppContext,
) -> Result<()>
{
    mutate_store(ctx, |store| {
        if !store.delete_fragment(&args.label)
        {
            bail!("no fragment labeled `{}`", args.label);
        }
        Ok(format!("deleted fragment `{}`", args.label))
    })
}

pub fn show(
    args: ShowArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let store = open_store(ctx)?;
    let Some(f) = store.get(&args.label)
    else
    {
        bail!("no fragment labeled `{}`", args.label);
    };

    if args.snippet
    {
        println!("{}", serde_json::to_string_pretty(&f.snippet_json())?);
        return Ok(());
    }
    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&f)?);
        return Ok(());
    }

    println!("{}", ctx.heading(&f.label));
    for (name, value) in [
        ("keywords", &f.keywords),
        ("scope", &f.scope),
        ("domain", &f.domain),
        ("tags", &f.tags),
        ("prefix", &f.prefix),
        ("placeholders", &f.placeholders),
        ("description", &f.description),
    ]
    {
        if !value.is_empty()
        {
            println!("  {name}: {value}");
        }
    }
    println!();
    println!("{}", f.body);
    Ok(())
}

#[derive(Tabled)]
struct FragmentRow
{
    label: String,
    scope: String,
    domain: String,
    keywords: String,
    tags: String,
}

pub fn list(
    args: ListArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let store = open_store(ctx)?;
    let fragments = store.get_filtered_fragments(
        args.filter
            .as_deref()
            .unwrap_or(""),
    )?;

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&fragments)?);
        return Ok(());
    }

    if fragments.is_empty()
    {
        if !ctx.quiet
        {
            eprintln!("no fragments");
        }
        return Ok(());
    }

    let rows: Vec<FragmentRow> = fragments
        .into_iter()
        .map(|f| FragmentRow {
            label: f.label,
            scope: f.scope,
            domain: f.domain,
            keywords: f.keywords,
            tags: f.tags,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

pub fn folder(
    args: FolderArgs,
    ctx: &AppContext,
) -> Result<()>
{
    match args.command
    {
        FolderSubcommand::Add { label, parent } => mutate_store(ctx, |store| {
            if !store
                .memory_mut()
                .add_folder(&label, parent.as_deref())?
            {
                bail!("a fragment or folder labeled `{label}` already exists");
            }
            Ok(format!("added folder `{label}`"))
        }),
        FolderSubcommand::Delete { label } => mutate_store(ctx, |store| {
            if !store
                .memory_mut()
                .delete_folder(&label)
            {
                bail!("no folder labeled `{label}`");
            }
            Ok(format!("deleted folder `{label}`"))
        }),
        FolderSubcommand::SetChildren { label, children } => mutate_store(ctx, |store| {
            store
                .memory_mut()
                .set_children(&label, &children)?;
            Ok(format!("set {} children of `{label}`", children.len()))
        }),
        FolderSubcommand::Tree =>
        {
            let store = open_store(ctx)?;
            let tree = store
                .memory()
                .tree();
            let no_color = ctx.no_color;
            let item = tree.to_ptree(|node: &FolderTree| paint_node(node, no_color));
            ptree::print_tree(&item)?;
            Ok(())
        }
    }
}

/// Folders end in `/`; colored unless --no-color
fn paint_node(
    node: &FolderTree,
    no_color: bool,
) -> String
{
    match (node.is_folder, no_color)
    {
        (true, true) => format!("{}/", node.label),
        (true, false) => format!("{}/", node.label.blue()),
        (false, true) => node.label.clone(),
        (false, false) => node.label.green().to_string(),
    }
}
