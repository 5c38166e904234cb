//! One host type threaded through three independent rings.

use core::pin::pin;
use intrusive_ring::{Anchor, Linked, Ring};

struct Tag0;
struct Tag1;
struct Tag2;

#[derive(Linked)]
struct A {
    tag_0: Anchor<Tag0>,
    tag_1: Anchor<Tag1>,
    tag_2: Anchor<Tag2>,
    x: i32,
}

impl A {
    fn new(x: i32) -> Self {
        Self {
            tag_0: Anchor::new(),
            tag_1: Anchor::new(),
            tag_2: Anchor::new(),
            x,
        }
    }
}

impl std::fmt::Debug for A {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.x)
    }
}

fn main() {
    let a0 = pin!(A::new(2));
    let a1 = pin!(A::new(3));
    let a2 = pin!(A::new(5));

    let l0 = Ring::<A, Tag0>::new();
    let l1 = Ring::<A, Tag1>::new();
    let l2 = Ring::<A, Tag2>::new();

    // Every host and ring lives until the end of `main`.
    unsafe {
        l0.link_back(a0.as_ref());
        l0.link_back(a1.as_ref());
        l0.link_back(a2.as_ref());
        l0.link_back(a0.as_ref());

        l1.link_back(a0.as_ref());
        l1.link_back(a2.as_ref());

        l2.link_back(a0.as_ref());
    }

    println!("{l0:?}");
    println!("{l1:?}");
    println!("{l2:?}");

    l0.unlink_front();
    l0.unlink_back();
    println!("{l0:?}");
    println!(
        "a0 linked by tag: {} {} {}",
        a0.tag_0.is_linked(),
        a0.tag_1.is_linked(),
        a0.tag_2.is_linked()
    );
}
