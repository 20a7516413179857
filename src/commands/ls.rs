//! # Ls Command Implementation
//!
//! Prints the dependency tree of the current checkout. Each line shows the
//! checkout name followed by its abbreviated revision, or `url#rev` with
//! `--all`. Children are listed in path order.
//!
//! This command is read-only.

use anyhow::Result;
use clap::Args;
use console::Style;
use ptree::{print_tree, TreeItem};
use std::borrow::Cow;

use reftree::output::OutputConfig;
use reftree::workflows::{self, TreeNode};

/// Print the dependency tree
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Show the URL and revision of every checkout.
    #[arg(short, long)]
    pub all: bool,

    /// Skip dependencies that cannot be read instead of failing.
    #[arg(short = 'I', long)]
    pub ignore: bool,

    /// Output the tree as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct DisplayNode {
    label: String,
    children: Vec<DisplayNode>,
}

impl DisplayNode {
    fn from_tree(node: &TreeNode, detailed: bool, output: &OutputConfig) -> Self {
        let label = format!(
            "{} {}",
            output.paint(&Style::new().bold(), &node.label),
            output.paint(&Style::new().dim(), &format!("({})", node.describe(detailed)))
        );
        let invalid = node.invalid.iter().map(|pointer| DisplayNode {
            label: format!(
                "{} {}",
                pointer,
                output.paint(&Style::new().red(), "(invalid reference)")
            ),
            children: Vec::new(),
        });
        DisplayNode {
            label,
            children: node
                .children
                .iter()
                .map(|child| DisplayNode::from_tree(child, detailed, output))
                .chain(invalid)
                .collect(),
        }
    }
}

impl TreeItem for DisplayNode {
    type Child = DisplayNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, output: &OutputConfig) -> Result<()> {
    let ctx = super::context()?.with_ignore(args.ignore);
    let tree = workflows::tree(&ctx, &ctx.root)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    let display = DisplayNode::from_tree(&tree, args.all, output);
    print_tree(&display).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    Ok(())
}
