//! Rendering of the notice block, as reStructuredText for the host
//! documentation build.

use std::fmt::Write;

/// Renders the notice for a validated, canonically sorted requirement list.
///
/// Grammar follows the count: one requirement reads "requirement" and "This
/// can be installed", several read "requirements" and "These can be
/// installed".
pub fn make_node_content(
    requirements: &[String],
    package_name: &str,
    extra: &str,
    scope: &str,
) -> String {
    let plural = requirements.len() > 1;
    let mut content = format!(
        "This {scope} has the following additional requirement{}:\n\
         \n    \
         .. code-block:: text\n\
         \n",
        if plural { "s" } else { "" }
    );
    for requirement in requirements {
        let _ = writeln!(content, "        {requirement}");
    }
    let _ = writeln!(
        content,
        "\n{} can be installed as follows:\n\
         \n    \
         .. code-block:: bash\n\
         \n        \
         $ python -m pip install {package_name}[{extra}]",
        if plural { "These" } else { "This" }
    );
    content
}
