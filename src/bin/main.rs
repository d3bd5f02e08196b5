use cordyceps_avl::{AvlMultiset, Order};

fn print_orders(set: &AvlMultiset<&str>) {
    for order in [
        Order::InOrder,
        Order::PreOrder,
        Order::PostOrder,
        Order::LevelOrder,
    ] {
        println!("{order:?}: {:?}", set.traverse(order).collect::<Vec<_>>());
    }
}

fn main() {
    let mut set = AvlMultiset::new();

    for name in [
        "les", "cathy", "sam", "frank", "nancy", "violet", "tony", "wendy", "alex",
    ] {
        set.insert(name);
        println!(
            "inserted {name}: height {}, level order {:?}",
            set.height(),
            set.traverse(Order::LevelOrder).collect::<Vec<_>>()
        );
    }

    print_orders(&set);
    assert!(set.is_balanced());

    println!("smallest: {:?}, largest: {:?}", set.first(), set.last());

    for name in ["sam", "les", "frank", "wendy"] {
        println!("successor of {name}: {:?}", set.successor(name));
    }

    for name in ["cathy", "wendy", "frank", "alex"] {
        println!("predecessor of {name}: {:?}", set.predecessor(name));
    }

    println!(
        "between e and u: {:?}",
        set.range::<&str, _>("e"..="u").collect::<Vec<_>>()
    );
    println!("neighbors of les: {:?}", set.neighbors("les"));

    for name in ["cathy", "frank", "violet", "sam"] {
        set.remove(name);
        println!(
            "removed {name}: height {}, level order {:?}",
            set.height(),
            set.traverse(Order::LevelOrder).collect::<Vec<_>>()
        );
    }

    assert!(set.is_balanced());
    println!("{set:?}");
}
