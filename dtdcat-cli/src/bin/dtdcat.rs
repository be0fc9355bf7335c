use std::path::PathBuf;

use clap::Parser;
use dtdcat::{
    CatalogBuilder, CatalogResolver, DTDParser, EntityResolver, XMLError, grammar::EntityKind,
};
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
struct Cli {
    #[clap(short, long, help = "Log resolution details")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print the declarations of a DTD and its modules.
    Grammar {
        #[clap(long, help = "Print only the root element")]
        root: bool,
        dtd: PathBuf,
    },
    /// Resolve an external identifier through a catalog.
    Resolve {
        #[clap(long, help = "Path to the catalog file")]
        catalog: PathBuf,
        #[clap(long)]
        public: Option<String>,
        #[clap(long)]
        system: Option<String>,
        #[clap(long, help = "Base URI of the referencing document")]
        base: Option<String>,
    },
    /// Resolve a URI reference through a catalog.
    Uri {
        #[clap(long, help = "Path to the catalog file")]
        catalog: PathBuf,
        uri: String,
    },
    /// Look up a DTD by its file name.
    Dtd {
        #[clap(long, help = "Path to the catalog file")]
        catalog: PathBuf,
        name: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Grammar { root, dtd } => do_grammar_command(root, dtd)?,
        Command::Resolve {
            catalog,
            public,
            system,
            base,
        } => do_resolve_command(catalog, public, system, base)?,
        Command::Uri { catalog, uri } => {
            let catalog = CatalogBuilder::global().catalog(catalog)?;
            print_location(catalog.match_uri(&uri).as_deref());
        }
        Command::Dtd { catalog, name } => {
            let catalog = CatalogBuilder::global().catalog(catalog)?;
            print_location(catalog.dtd(&name));
        }
    }
    Ok(())
}

fn do_grammar_command(root: bool, dtd: PathBuf) -> Result<(), XMLError> {
    let grammar = DTDParser::new().parse(dtd)?;
    if root {
        match grammar.root_element() {
            Some(root) => println!("{root}"),
            None => eprintln!("no unique root element"),
        }
        return Ok(());
    }

    print!("{grammar}");
    let mut externals = grammar
        .entities()
        .filter(|entity| entity.kind() != EntityKind::Internal)
        .filter_map(|entity| Some((entity.name(), entity.system_id()?)))
        .collect::<Vec<_>>();
    externals.sort();
    for (name, system_id) in externals {
        println!("<!-- {name}: {} -->", system_id.display());
    }
    Ok(())
}

fn do_resolve_command(
    catalog: PathBuf,
    public: Option<String>,
    system: Option<String>,
    base: Option<String>,
) -> Result<(), XMLError> {
    let catalog = CatalogBuilder::global().catalog(catalog)?;
    let mut resolver = CatalogResolver::new(catalog);
    let source = match system.as_deref() {
        Some(system) => {
            resolver.resolve_entity("[dtd]", public.as_deref(), base.as_deref(), system)?
        }
        None => resolver.resolve_public_system(public.as_deref(), None)?,
    };
    match source.as_ref().and_then(|source| source.system_id()) {
        Some(system_id) => println!("{system_id}"),
        None => eprintln!("not found"),
    }
    Ok(())
}

fn print_location(location: Option<&std::path::Path>) {
    match location {
        Some(location) => println!("{}", location.display()),
        None => eprintln!("not found"),
    }
}
