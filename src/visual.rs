use core::{
    fmt::{self, LowerHex, Write},
    ptr::NonNull,
};

use crate::{Color, Links, RbTree, TreeNode};

/// Rendering style for [`Visual`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Style {
    /// Red nodes are prefixed with `*`.
    #[default]
    Colored,

    /// Only the shape of the tree is rendered.
    Shape,
}

/// A compact textual encoding of the shape of an [`RbTree`].
///
/// Each node renders as its key in lowercase hexadecimal, followed by its left subtree in
/// parentheses (if present) and its right subtree in parentheses (if present). In the
/// [`Style::Colored`] style, red nodes are prefixed with `*`. A black root `0x11` with a red left
/// child `0x5` renders as `11(*5)`; an empty tree renders as the empty string.
///
/// Created by [`RbTree::visual`] and [`RbTree::visual_with`].
pub struct Visual<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree RbTree<T>,
    style: Style,
}

impl<T> RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: LowerHex,
{
    /// Returns a [`Display`](fmt::Display) adapter rendering the tree in the colored style.
    pub fn visual(&self) -> Visual<'_, T> {
        self.visual_with(Style::Colored)
    }

    /// Returns a [`Display`](fmt::Display) adapter rendering the tree in the given style.
    pub fn visual_with(&self, style: Style) -> Visual<'_, T> {
        Visual { tree: self, style }
    }

    /// Writes the compact encoding of the tree to `w`.
    pub fn write_visual<W: Write>(&self, w: &mut W, style: Style) -> fmt::Result {
        match self.root {
            Some(root) => unsafe { write_subtree(w, root, style) },
            None => Ok(()),
        }
    }

    /// Returns the compact encoding of the tree in the colored style.
    #[cfg(feature = "alloc")]
    pub fn construct_visual(&self) -> alloc::string::String {
        use alloc::string::ToString;

        self.visual().to_string()
    }
}

// Tree height is logarithmic in the node count, so recursion depth stays small.
unsafe fn write_subtree<T, W>(w: &mut W, node: NonNull<T>, style: Style) -> fmt::Result
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: LowerHex,
    W: Write,
{
    unsafe {
        let links = T::links(node).as_ref();

        if style == Style::Colored && links.color() == Color::Red {
            w.write_char('*')?;
        }

        write!(w, "{:x}", node.as_ref().key())?;

        for child in [links.left(), links.right()].into_iter().flatten() {
            w.write_char('(')?;
            write_subtree(w, child, style)?;
            w.write_char(')')?;
        }

        Ok(())
    }
}

impl<T> fmt::Display for Visual<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: LowerHex,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.write_visual(f, self.style)
    }
}

#[cfg(feature = "alloc")]
impl<T> RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: LowerHex,
{
    /// Writes a Graphviz digraph of the tree to `w`, one rank per tree level.
    pub fn dotgraph<W: Write>(&self, name: &str, mut w: W) -> fmt::Result {
        use alloc::{collections::VecDeque, string::String};

        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T: ?Sized> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        while !queue.is_empty() {
            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let node = match item {
                    Item::Node(node) => node,
                    Item::Missing(id) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let (key, color, left, right) = unsafe {
                    let node_links = T::links(node).as_ref();
                    (
                        node.as_ref().key(),
                        node_links.color(),
                        node_links.left(),
                        node_links.right(),
                    )
                };

                let fill = match color {
                    Color::Red => "red",
                    Color::Black => "black",
                };
                write!(
                    w,
                    "\"graph{name}-{key:x}\" [label=\"{key:x}\", style=filled, fillcolor={fill}, fontcolor=white]; "
                )?;

                for child in [left, right] {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };

                            queue.push_back(Item::Node(child));
                            writeln!(
                                links,
                                "\"graph{name}-{key:x}\" -> \"graph{name}-{child_key:x}\";"
                            )?;
                        }
                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                links,
                                "\"graph{name}-{key:x}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}
